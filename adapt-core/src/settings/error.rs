//! Settings registry error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or persisting settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading a settings file failed
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a settings file or creating its directory failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid JSON for its document type
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No block exists for the key, neither persisted nor registered
    #[error("No settings block for '{key}'")]
    NotPresent { key: String },

    /// A block exists but does not deserialize into the registered type
    #[error("Settings block '{key}' has the wrong shape: {source}")]
    WrongShape {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A registered block could not be serialized
    #[error("Failed to serialize settings block '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
