//! Plugin host error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the plugin host
#[derive(Error, Debug)]
pub enum PluginHostError {
    /// Plugin directory could not be created or read
    #[error("Plugin directory unavailable: {path}: {source}")]
    PluginDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not a loadable plugin library
    #[error("Not a plugin library: {path}")]
    NotALibrary { path: PathBuf },

    /// API version mismatch between adapt and plugin
    #[error("API version mismatch: adapt expects {expected}, plugin has {found}")]
    ApiVersionMismatch { expected: u32, found: u32 },

    /// Failed to load dynamic library
    #[error("Failed to load plugin library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// Plugin initialization failed
    #[error("Plugin initialization failed: {0}")]
    InitFailed(#[from] adapt_plugin_api::PluginError),

    /// A hook returned an error
    #[error("Plugin '{name}' failed in {hook}: {source}")]
    HookFailed {
        name: String,
        hook: &'static str,
        #[source]
        source: adapt_plugin_api::PluginError,
    },

    /// A hook, constructor or initializer panicked
    #[error("Plugin '{name}' panicked in {hook}")]
    Panicked { name: String, hook: &'static str },

    /// Plugin timed out
    #[error("Plugin '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}
