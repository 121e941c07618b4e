//! Default locations of the plugin directory and the settings data
//! directory.
//!
//! Both follow the XDG base directory variables on every platform.

use std::path::PathBuf;

/// Directory scanned for plugin libraries.
///
/// `$XDG_CONFIG_HOME/adapt/plugins`, falling back to
/// `~/.config/adapt/plugins`.
pub fn plugin_dir() -> PathBuf {
    xdg_home("XDG_CONFIG_HOME", ".config").join("plugins")
}

/// Directory holding `Settings.json` and the per-tenant settings.
///
/// `$XDG_DATA_HOME/adapt`, falling back to `~/.local/share/adapt`.
pub fn data_dir() -> PathBuf {
    xdg_home("XDG_DATA_HOME", ".local/share")
}

fn xdg_home(var: &str, fallback: &str) -> PathBuf {
    let base = match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir().unwrap_or_default().join(fallback),
    };
    base.join("adapt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_respect_xdg_env() {
        // One test mutates the variables so parallel tests never race on them
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
            std::env::set_var("XDG_DATA_HOME", "/tmp/test-data");
        }
        assert_eq!(plugin_dir(), PathBuf::from("/tmp/test-config/adapt/plugins"));
        assert_eq!(data_dir(), PathBuf::from("/tmp/test-data/adapt"));

        // Empty counts as unset
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "");
        }
        assert!(data_dir().ends_with(".local/share/adapt"));

        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
            std::env::remove_var("XDG_DATA_HOME");
        }
        assert!(plugin_dir().ends_with(".config/adapt/plugins"));
    }
}
