//! SettingsRegistry - global and per-tenant settings persistence

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use adapt_plugin_api::TenantId;
use adapt_plugin_api::settings::{DecodeBlock, ErasedBlock, ErasedTenantMap, SettingsStore};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::document::{DiscordSettings, GlobalDocument};
use super::error::SettingsError;
use super::SettingsLayout;

/// A plugin's global block: raw until the plugin registers its type
enum GlobalEntry {
    Pending(Value),
    Registered(Arc<dyn ErasedBlock>),
}

struct State {
    discord: DiscordSettings,
    globals: BTreeMap<String, GlobalEntry>,
    tenant_maps: BTreeMap<String, Arc<dyn ErasedTenantMap>>,
    known_tenants: BTreeSet<TenantId>,
}

/// Outcome of a save
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Files that were written
    pub written: Vec<PathBuf>,
    /// Files that could not be written, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl SaveReport {
    /// Whether every file was written
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns every plugin's settings and their on-disk representation.
///
/// Built once at startup and shared through an `Arc`. Plugins reach it
/// through [`PluginContext`](adapt_plugin_api::PluginContext), which talks
/// to it as a [`SettingsStore`].
pub struct SettingsRegistry {
    layout: SettingsLayout,
    state: Mutex<State>,
    save_lock: Mutex<()>,
}

impl SettingsRegistry {
    /// Load the global document and prepare the tenant root.
    ///
    /// A document that fails to parse is copied to its `_corrupted` backup
    /// and replaced by a fresh default; the original file is left in place
    /// until the next save overwrites it.
    pub fn load(layout: SettingsLayout) -> Self {
        let document = match read_json::<GlobalDocument>(&layout.global_file) {
            Ok(Some(document)) => {
                info!(path = %layout.global_file.display(), "Loaded settings");
                document
            }
            Ok(None) => {
                info!(path = %layout.global_file.display(), "No settings file, using defaults");
                GlobalDocument::default()
            }
            Err(e) => {
                error!(error = %e, "Failed to load settings, resetting to defaults");
                let backup = layout.corrupted_backup();
                match fs::copy(&layout.global_file, &backup) {
                    Ok(_) => warn!(backup = %backup.display(), "Backed up unreadable settings"),
                    Err(e) => error!(
                        backup = %backup.display(),
                        error = %e,
                        "Failed to back up unreadable settings"
                    ),
                }
                GlobalDocument::default()
            }
        };

        if let Err(e) = fs::create_dir_all(&layout.tenant_root) {
            error!(
                path = %layout.tenant_root.display(),
                error = %e,
                "Failed to create tenant settings directory"
            );
        }

        let globals = document
            .components
            .into_iter()
            .map(|(key, value)| (key, GlobalEntry::Pending(value)))
            .collect();

        Self {
            layout,
            state: Mutex::new(State {
                discord: document.discord,
                globals,
                tenant_maps: BTreeMap::new(),
                known_tenants: BTreeSet::new(),
            }),
            save_lock: Mutex::new(()),
        }
    }

    /// Load from the standard layout below `data_dir`
    pub fn load_dir(data_dir: &Path) -> Self {
        Self::load(SettingsLayout::in_dir(data_dir))
    }

    /// File locations this registry persists to
    pub fn layout(&self) -> &SettingsLayout {
        &self.layout
    }

    /// Connection settings
    pub fn discord(&self) -> DiscordSettings {
        self.lock_state().discord.clone()
    }

    /// The configured bot token, if any
    pub fn bot_token(&self) -> Option<String> {
        let state = self.lock_state();
        state
            .discord
            .has_token()
            .then(|| state.discord.bot_token.clone())
    }

    /// Replace the bot token (persisted on the next save)
    pub fn set_bot_token(&self, token: impl Into<String>) {
        self.lock_state().discord.bot_token = token.into();
    }

    /// Keys that have a global block, registered or not
    pub fn global_keys(&self) -> Vec<String> {
        self.lock_state().globals.keys().cloned().collect()
    }

    /// Current JSON value of a global block
    pub fn global_value(&self, key: &str) -> Result<Value, SettingsError> {
        let state = self.lock_state();
        match state.globals.get(key) {
            Some(GlobalEntry::Pending(value)) => Ok(value.clone()),
            Some(GlobalEntry::Registered(block)) => {
                block.to_value().map_err(|source| SettingsError::Serialize {
                    key: key.to_string(),
                    source,
                })
            }
            None => Err(SettingsError::NotPresent {
                key: key.to_string(),
            }),
        }
    }

    /// Tenants registered through [`register_tenant`](Self::register_tenant)
    pub fn known_tenants(&self) -> Vec<TenantId> {
        self.lock_state().known_tenants.iter().copied().collect()
    }

    /// Make a tenant known and give it settings for every registered map.
    ///
    /// Persisted entries are loaded from `<tenant root>/<id>/<key>.json`;
    /// missing, `null` or undecodable entries get the block's default.
    /// Everything is saved afterwards.
    pub fn register_tenant(&self, tenant: TenantId) -> Result<SaveReport, SettingsError> {
        let dir = self.layout.tenant_dir(tenant);
        fs::create_dir_all(&dir).map_err(|source| SettingsError::Write {
            path: dir.clone(),
            source,
        })?;

        let maps: Vec<(String, Arc<dyn ErasedTenantMap>)> = {
            let mut state = self.lock_state();
            state.known_tenants.insert(tenant);
            state
                .tenant_maps
                .iter()
                .map(|(key, map)| (key.clone(), Arc::clone(map)))
                .collect()
        };

        for (key, map) in &maps {
            self.populate(tenant, key, map.as_ref());
        }

        debug!(tenant, plugins = maps.len(), "Registered tenant for settings");
        Ok(self.save_all())
    }

    /// Forget a tenant and delete its settings directory
    pub fn purge_tenant(&self, tenant: TenantId) -> Result<(), SettingsError> {
        {
            let mut state = self.lock_state();
            state.known_tenants.remove(&tenant);
            for map in state.tenant_maps.values() {
                map.remove(tenant);
            }
        }

        let dir = self.layout.tenant_dir(tenant);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|source| SettingsError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        info!(tenant, "Purged tenant settings");
        Ok(())
    }

    /// Persist the global document and every tenant entry.
    ///
    /// Saves are serialized. A file that cannot be written is logged and
    /// reported; the rest are still written. If any global block fails to
    /// serialize the global document is left untouched for this save.
    pub fn save_all(&self) -> SaveReport {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = SaveReport::default();

        let (discord, globals, maps) = {
            let state = self.lock_state();
            let globals: Vec<(String, GlobalValue)> = state
                .globals
                .iter()
                .map(|(key, entry)| {
                    let value = match entry {
                        GlobalEntry::Pending(value) => GlobalValue::Ready(value.clone()),
                        GlobalEntry::Registered(block) => GlobalValue::Block(Arc::clone(block)),
                    };
                    (key.clone(), value)
                })
                .collect();
            let maps: Vec<(String, Arc<dyn ErasedTenantMap>)> = state
                .tenant_maps
                .iter()
                .map(|(key, map)| (key.clone(), Arc::clone(map)))
                .collect();
            (state.discord.clone(), globals, maps)
        };

        // Blocks are serialized outside the state lock
        let mut document = GlobalDocument {
            discord,
            components: BTreeMap::new(),
        };
        let mut document_ok = true;
        for (key, value) in globals {
            match value.into_value() {
                Ok(value) => {
                    document.components.insert(key, value);
                }
                Err(source) => {
                    let e = SettingsError::Serialize { key, source };
                    error!(error = %e, "Failed to serialize global settings");
                    document_ok = false;
                }
            }
        }

        let global_file = self.layout.global_file.clone();
        if document_ok {
            self.write_file(&global_file, &document, &mut report);
        } else {
            report
                .failed
                .push((global_file, "a settings block failed to serialize".into()));
        }

        for (key, map) in maps {
            for (tenant, value) in map.snapshot() {
                let path = self.layout.tenant_file(tenant, &key);
                match value {
                    Ok(value) => self.write_file(&path, &value, &mut report),
                    Err(e) => {
                        error!(plugin = %key, tenant, error = %e, "Failed to serialize tenant settings");
                        report.failed.push((path, e.to_string()));
                    }
                }
            }
        }

        debug!(
            written = report.written.len(),
            failed = report.failed.len(),
            "Saved settings"
        );
        report
    }

    fn write_file<T: Serialize>(&self, path: &Path, value: &T, report: &mut SaveReport) {
        match write_json(path, value) {
            Ok(()) => report.written.push(path.to_path_buf()),
            Err(e) => {
                error!(error = %e, "Failed to save settings file");
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    fn populate(&self, tenant: TenantId, key: &str, map: &dyn ErasedTenantMap) {
        if map.contains(tenant) {
            return;
        }

        let path = self.layout.tenant_file(tenant, key);
        match read_json::<Value>(&path) {
            Ok(Some(Value::Null)) | Ok(None) => {}
            Ok(Some(value)) => match map.load(tenant, value) {
                Ok(()) => debug!(plugin = %key, tenant, "Loaded tenant settings"),
                Err(source) => {
                    let e = SettingsError::WrongShape {
                        key: key.to_string(),
                        source,
                    };
                    error!(tenant, error = %e, "Failed to load tenant settings, using defaults");
                }
            },
            Err(e) => error!(tenant, error = %e, "Failed to load tenant settings, using defaults"),
        }

        if !map.contains(tenant) {
            map.insert_default(tenant);
            debug!(plugin = %key, tenant, "Created default tenant settings");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum GlobalValue {
    Ready(Value),
    Block(Arc<dyn ErasedBlock>),
}

impl GlobalValue {
    fn into_value(self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Block(block) => block.to_value(),
        }
    }
}

impl SettingsStore for SettingsRegistry {
    fn register_global(
        &self,
        key: &str,
        default: Arc<dyn ErasedBlock>,
        decode: DecodeBlock<'_>,
    ) -> Arc<dyn ErasedBlock> {
        {
            let mut state = self.lock_state();
            let pending = match state.globals.get(key) {
                Some(GlobalEntry::Registered(block)) => return Arc::clone(block),
                Some(GlobalEntry::Pending(value)) => Some(value.clone()),
                None => None,
            };

            if let Some(value) = pending {
                match decode(value) {
                    Ok(block) => {
                        state
                            .globals
                            .insert(key.to_string(), GlobalEntry::Registered(Arc::clone(&block)));
                        debug!(plugin = %key, "Loaded global settings");
                        return block;
                    }
                    Err(source) => {
                        let e = SettingsError::WrongShape {
                            key: key.to_string(),
                            source,
                        };
                        error!(error = %e, "Failed to load global settings, using defaults");
                    }
                }
            }

            state
                .globals
                .insert(key.to_string(), GlobalEntry::Registered(Arc::clone(&default)));
        }

        info!(plugin = %key, "Created new global settings");
        self.save_all();
        default
    }

    fn register_tenant_settings(
        &self,
        key: &str,
        map: Arc<dyn ErasedTenantMap>,
    ) -> Arc<dyn ErasedTenantMap> {
        let known: Vec<TenantId> = {
            let mut state = self.lock_state();
            if let Some(existing) = state.tenant_maps.get(key) {
                return Arc::clone(existing);
            }
            state.tenant_maps.insert(key.to_string(), Arc::clone(&map));
            state.known_tenants.iter().copied().collect()
        };

        if !known.is_empty() {
            for tenant in known {
                self.populate(tenant, key, map.as_ref());
            }
            self.save_all();
        }
        map
    }

    fn save(&self) {
        self.save_all();
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|source| SettingsError::Serialize {
        key: path.display().to_string(),
        source,
    })?;
    fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
