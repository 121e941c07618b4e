use std::path::PathBuf;
use std::time::Duration;

use adapt_core::PluginHostConfig;
use adapt_core::plugins::DispatchStrategy;
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAdaptConfig {
    #[serde(default)]
    pub plugins: RawPluginsConfig,

    #[serde(default)]
    pub data: RawDataConfig,

    #[serde(default)]
    pub dispatch: RawDispatchConfig,

    #[serde(default)]
    pub commands: RawCommandsConfig,

    #[serde(default)]
    pub tenants: RawTenantsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPluginsConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDataConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDispatchConfig {
    pub strategy: Option<DispatchStrategy>,
    pub hook_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCommandsConfig {
    pub refresh_command: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTenantsConfig {
    pub purge_settings_on_leave: Option<bool>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdaptConfig {
    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub tenants: TenantsConfig,
}

impl AdaptConfig {
    /// Host configuration for these settings
    pub fn host_config(&self) -> PluginHostConfig {
        PluginHostConfig {
            plugin_dir: self.plugins.dir.clone(),
            data_dir: self.data.dir.clone(),
            dispatch: self.dispatch.strategy,
            hook_timeout: self.dispatch.hook_timeout_ms.map(Duration::from_millis),
            refresh_command: self.commands.refresh_command,
            purge_settings_on_leave: self.tenants.purge_settings_on_leave,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory scanned for plugin libraries
    pub dir: PathBuf,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: adapt_paths::plugin_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding Settings.json and the per-tenant files
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: adapt_paths::data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DispatchConfig {
    /// `sequential` waits for every plugin; `detached` returns immediately
    #[serde(default)]
    pub strategy: DispatchStrategy,

    /// Fail hooks that take longer than this (no limit when unset)
    pub hook_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Register the `refresh-commands` command
    pub refresh_command: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            refresh_command: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenantsConfig {
    /// Delete a tenant's settings when the bot leaves it
    pub purge_settings_on_leave: bool,
}
