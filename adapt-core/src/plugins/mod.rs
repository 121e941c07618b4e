//! Plugin system for adapt
//!
//! This module provides the infrastructure for loading plugins and driving
//! them from a session:
//!
//! - [`PluginLoader`]: Finds load units and instantiates their plugins
//! - [`ComponentRegistry`]: The ordered set of loaded plugins
//! - [`Dispatcher`]: Fans one hook out to every plugin with failure isolation
//! - [`CommandLifecycle`]: One-time command creation and the refresh command
//! - [`PluginHost`]: Ties the above to a session and the settings registry
//!
//! # Plugin Discovery
//!
//! Built-in plugins are registered in code with
//! [`PluginHost::with_built_in`]. Dynamic plugins are libraries directly in
//! the plugin directory (`~/.config/adapt/plugins/`), built with
//! `adapt_plugin_api::export_plugins!`. A library with one plugin type is
//! keyed by its file stem (`libstatus.so` -> `status`); with several types
//! each gets `<stem>.<TypeName>`.
//!
//! # Example
//!
//! ```ignore
//! use adapt_core::plugins::{PluginHost, PluginHostConfig};
//!
//! let mut host = PluginHost::new(PluginHostConfig::default())
//!     .with_built_in("status", &[PluginType::of::<StatusMessage>("StatusMessage")]);
//!
//! if host.initialize_connection(&factory).await? {
//!     host.run().await?;
//! }
//! ```

mod commands;
mod dispatch;
mod error;
mod host;
mod loader;
mod registry;
mod unit;

pub use commands::{
    CommandLifecycle, InteractionOutcome, REFRESH_COMMAND_DESCRIPTION, REFRESH_COMMAND_NAME,
    REFRESH_DONE, REFRESH_FAILED, RefreshReport,
};
pub use dispatch::{DispatchFailure, DispatchReport, DispatchStrategy, Dispatcher, Hook};
pub use error::PluginHostError;
pub use host::{PluginHost, PluginHostConfig};
pub use loader::{DiscoveredPlugin, PluginLoader};
pub use registry::{
    ComponentRegistry, LoadedPlugin, PluginDescriptor, PluginSlot, PluginState, SharedPlugin,
};
pub use unit::{LIBRARY_EXTENSIONS, LoadUnit, is_library, unit_key};
