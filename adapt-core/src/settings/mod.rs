//! Two-tier settings registry
//!
//! - [`SettingsRegistry`]: global blocks (one per plugin) in a single
//!   document, plus per-tenant blocks in one file per tenant and plugin
//! - [`SettingsLayout`]: where those files live
//!
//! # On-disk layout
//!
//! ```text
//! <data dir>/
//! ├── Settings.json              # Discord section + one block per plugin
//! ├── Settings.json_corrupted    # copy of a document that failed to parse
//! └── Servers/
//!     └── <tenant id>/
//!         └── <plugin key>.json
//! ```

mod document;
mod error;
mod registry;

use std::path::{Path, PathBuf};

use adapt_plugin_api::TenantId;

pub use document::{DiscordSettings, GlobalDocument};
pub use error::SettingsError;
pub use registry::{SaveReport, SettingsRegistry};

/// Extension of every settings file
pub const SETTINGS_EXTENSION: &str = "json";

/// File locations used by the settings registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsLayout {
    /// The global settings document
    pub global_file: PathBuf,
    /// Directory holding one sub-directory per tenant
    pub tenant_root: PathBuf,
}

impl SettingsLayout {
    /// Standard layout below a data directory
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            global_file: data_dir.join(format!("Settings.{SETTINGS_EXTENSION}")),
            tenant_root: data_dir.join("Servers"),
        }
    }

    /// Directory for one tenant's files
    pub fn tenant_dir(&self, tenant: TenantId) -> PathBuf {
        self.tenant_root.join(tenant.to_string())
    }

    /// File holding one plugin's settings for one tenant
    pub fn tenant_file(&self, tenant: TenantId, plugin_key: &str) -> PathBuf {
        self.tenant_dir(tenant)
            .join(format!("{plugin_key}.{SETTINGS_EXTENSION}"))
    }

    /// Where a document that failed to parse is copied
    pub fn corrupted_backup(&self) -> PathBuf {
        let mut name = self.global_file.clone().into_os_string();
        name.push("_corrupted");
        PathBuf::from(name)
    }
}

impl Default for SettingsLayout {
    fn default() -> Self {
        Self::in_dir(&adapt_paths::data_dir())
    }
}
