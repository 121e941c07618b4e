use super::types::{
    AdaptConfig, CommandsConfig, DataConfig, DispatchConfig, PluginsConfig, RawAdaptConfig,
    RawCommandsConfig, RawDataConfig, RawDispatchConfig, RawPluginsConfig, RawTenantsConfig,
    TenantsConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<AdaptConfig> {
        let mut layers = Vec::new();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }

        // Layer 2: Project config
        layers.push(Self::project_config_path());

        Self::load_layers(&layers)
    }

    /// Merge the files that exist, later files overriding earlier ones
    fn load_layers(paths: &[PathBuf]) -> Result<AdaptConfig> {
        let mut raw = RawAdaptConfig::default();
        for path in paths.iter().filter(|p| p.exists()) {
            let layer = Self::read_raw(path)?;
            raw = Self::merge_raw(raw, layer);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawAdaptConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "adapt").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with ADAPT_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("ADAPT_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".adapt/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawAdaptConfig, overlay: RawAdaptConfig) -> RawAdaptConfig {
        RawAdaptConfig {
            plugins: RawPluginsConfig {
                dir: overlay.plugins.dir.or(base.plugins.dir),
            },
            data: RawDataConfig {
                dir: overlay.data.dir.or(base.data.dir),
            },
            dispatch: RawDispatchConfig {
                strategy: overlay.dispatch.strategy.or(base.dispatch.strategy),
                hook_timeout_ms: overlay
                    .dispatch
                    .hook_timeout_ms
                    .or(base.dispatch.hook_timeout_ms),
            },
            commands: RawCommandsConfig {
                refresh_command: overlay
                    .commands
                    .refresh_command
                    .or(base.commands.refresh_command),
            },
            tenants: RawTenantsConfig {
                purge_settings_on_leave: overlay
                    .tenants
                    .purge_settings_on_leave
                    .or(base.tenants.purge_settings_on_leave),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAdaptConfig) -> AdaptConfig {
        let defaults = AdaptConfig::default();
        AdaptConfig {
            plugins: PluginsConfig {
                dir: raw.plugins.dir.unwrap_or(defaults.plugins.dir),
            },
            data: DataConfig {
                dir: raw.data.dir.unwrap_or(defaults.data.dir),
            },
            dispatch: DispatchConfig {
                strategy: raw.dispatch.strategy.unwrap_or(defaults.dispatch.strategy),
                // Zero means no limit
                hook_timeout_ms: raw.dispatch.hook_timeout_ms.filter(|ms| *ms > 0),
            },
            commands: CommandsConfig {
                refresh_command: raw
                    .commands
                    .refresh_command
                    .unwrap_or(defaults.commands.refresh_command),
            },
            tenants: TenantsConfig {
                purge_settings_on_leave: raw
                    .tenants
                    .purge_settings_on_leave
                    .unwrap_or(defaults.tenants.purge_settings_on_leave),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapt_core::plugins::DispatchStrategy;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_layers(&[path]).unwrap();

        assert_eq!(config.data.dir, adapt_paths::data_dir());
        assert_eq!(config.dispatch.strategy, DispatchStrategy::Sequential);
        assert!(config.commands.refresh_command);
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            &temp_dir,
            "config.toml",
            r#"
[plugins]
dir = "/srv/adapt/plugins"

[dispatch]
strategy = "detached"
hook_timeout_ms = 5000

[tenants]
purge_settings_on_leave = true
"#,
        );

        let config = ConfigLoader::load_layers(&[path]).unwrap();

        assert_eq!(config.plugins.dir, PathBuf::from("/srv/adapt/plugins"));
        assert_eq!(config.dispatch.strategy, DispatchStrategy::Detached);
        assert_eq!(config.dispatch.hook_timeout_ms, Some(5000));
        assert!(config.tenants.purge_settings_on_leave);
        assert!(config.commands.refresh_command);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "invalid.toml", "this is not valid toml {{{{");

        let err = ConfigLoader::load_layers(&[path]).unwrap_err();
        assert!(err.to_string().contains("invalid.toml"));
    }

    #[test]
    fn test_project_layer_overrides_user_layer() {
        let temp_dir = TempDir::new().unwrap();
        let user = write(
            &temp_dir,
            "user.toml",
            r#"
[data]
dir = "/home/ada/adapt"

[commands]
refresh_command = false

[dispatch]
hook_timeout_ms = 1000
"#,
        );
        let project = write(
            &temp_dir,
            "project.toml",
            r#"
[commands]
refresh_command = true
"#,
        );

        let config = ConfigLoader::load_layers(&[user, project]).unwrap();

        // Overridden by the project layer
        assert!(config.commands.refresh_command);
        // Preserved from the user layer
        assert_eq!(config.data.dir, PathBuf::from("/home/ada/adapt"));
        assert_eq!(config.dispatch.hook_timeout_ms, Some(1000));
    }

    #[test]
    fn test_zero_hook_timeout_means_no_limit() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "config.toml", "[dispatch]\nhook_timeout_ms = 0\n");

        let config = ConfigLoader::load_layers(&[path]).unwrap();
        assert!(config.dispatch.hook_timeout_ms.is_none());
        assert!(config.host_config().hook_timeout.is_none());
    }

    #[test]
    fn test_merge_raw_none_preserves_base() {
        let base = RawAdaptConfig {
            plugins: RawPluginsConfig {
                dir: Some(PathBuf::from("/base/plugins")),
            },
            dispatch: RawDispatchConfig {
                strategy: Some(DispatchStrategy::Detached),
                hook_timeout_ms: None,
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge_raw(base, RawAdaptConfig::default());

        assert_eq!(merged.plugins.dir, Some(PathBuf::from("/base/plugins")));
        assert_eq!(merged.dispatch.strategy, Some(DispatchStrategy::Detached));
        assert!(merged.dispatch.hook_timeout_ms.is_none());
    }

    #[test]
    fn test_user_config_path_returns_some() {
        let path = ConfigLoader::user_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("adapt"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_project_config_path() {
        let path = ConfigLoader::project_config_path();
        assert!(path.ends_with("config.toml"));
    }
}
