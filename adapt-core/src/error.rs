//! Error types for adapt-core

use thiserror::Error;

use crate::plugins::PluginHostError;
use crate::session::SessionError;
use crate::settings::SettingsError;

/// Top-level error type for adapt-core
#[derive(Error, Debug)]
pub enum AdaptError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginHostError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("The host is not connected to a session")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_conversion() {
        let err: AdaptError = SessionError::AlreadyStarted.into();
        assert!(matches!(err, AdaptError::Session(_)));
        assert!(err.to_string().contains("already started"));
    }

    #[test]
    fn test_settings_error_conversion() {
        let err: AdaptError = SettingsError::NotPresent { key: "k".into() }.into();
        assert!(matches!(err, AdaptError::Settings(_)));
    }
}
