//! CLI subcommands

pub mod config;
pub mod plugins;
pub mod run;
pub mod settings;

use adapt_core::PluginHost;
use adapt_plugin_api::PluginType;
use adapt_status::StatusMessage;

use crate::config::AdaptConfig;

/// Key the status plugin is loaded under
pub const STATUS_PLUGIN_KEY: &str = "adapt_status";

/// Plugins compiled into the binary
pub static STATUS_PLUGINS: &[PluginType] =
    &[PluginType::of::<StatusMessage>("adapt_status::StatusMessage")];

/// A host for `config`, with the built-in plugins registered
pub fn build_host(config: &AdaptConfig) -> PluginHost {
    PluginHost::new(config.host_config()).with_built_in(STATUS_PLUGIN_KEY, STATUS_PLUGINS)
}
