//! Plugin loader - discovers load units and instantiates their plugins

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use adapt_plugin_api::{Plugin, PluginContext, PluginManifest, PluginType};
use serde::Serialize;
use tracing::{debug, error, info};

use super::error::PluginHostError;
use super::registry::{ComponentRegistry, LoadedPlugin, PluginDescriptor, PluginSlot, PluginState};
use super::unit::{LoadUnit, is_library};

/// A plugin found by [`PluginLoader::discover`]
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPlugin {
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    /// Where the plugin came from: `built-in` or the library path
    pub source: String,
    #[serde(flatten)]
    pub state: PluginState,
}

/// Builds the component registry from built-in units and the plugin directory
pub struct PluginLoader {
    plugin_dir: PathBuf,
    built_in: Vec<LoadUnit>,
}

impl PluginLoader {
    /// Create a loader scanning `plugin_dir`
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            built_in: Vec::new(),
        }
    }

    /// Builder: register a unit compiled into the host
    pub fn with_built_in(mut self, key: impl Into<String>, types: &[PluginType]) -> Self {
        self.built_in.push(LoadUnit::built_in(key, types));
        self
    }

    /// Register a unit compiled into the host
    pub fn add_built_in(&mut self, key: impl Into<String>, types: &[PluginType]) {
        self.built_in.push(LoadUnit::built_in(key, types));
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Instantiate and initialize every plugin.
    ///
    /// `make_context` builds the context for a plugin key. A plugin that
    /// panics while being created, or whose `initialize` fails or panics,
    /// is kept as an absent slot. Load errors never abort loading.
    ///
    /// A key loaded twice keeps the later plugin. Settings are keyed by
    /// plugin key, so the later plugin gets the blocks the earlier one
    /// registered; the collision is logged as an error.
    pub fn load_all(
        &self,
        mut make_context: impl FnMut(&str) -> PluginContext,
    ) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();

        for unit in self.units() {
            for plugin_type in unit.types() {
                let key = unit.plugin_key(plugin_type);
                if let Some(earlier) = registry.get(&key) {
                    error!(
                        plugin = %key,
                        earlier = %earlier.descriptor.name,
                        later = plugin_type.short_name(),
                        "Plugin key collision, the later plugin replaces the earlier one \
                         and shares its settings"
                    );
                }
                let context = make_context(&key);
                let slot = load_plugin(&unit, plugin_type, key, context);
                registry.insert(slot);
            }
        }

        info!(
            loaded = registry.present_count(),
            failed = registry.len() - registry.present_count(),
            "Loaded plugins:"
        );
        for slot in registry.all().iter().filter(|slot| slot.is_present()) {
            info!(
                plugin = %slot.descriptor.key,
                "{}: {}", slot.descriptor.name, slot.descriptor.description
            );
        }

        registry
    }

    /// List plugins without initializing them or opening a session
    pub fn discover(&self) -> Vec<DiscoveredPlugin> {
        let mut found: Vec<DiscoveredPlugin> = Vec::new();

        for unit in self.units() {
            let source = match unit.path() {
                Some(path) => path.display().to_string(),
                None => "built-in".to_string(),
            };

            for plugin_type in unit.types() {
                let key = unit.plugin_key(plugin_type);
                let (descriptor, state) = match create(plugin_type) {
                    Ok((_instance, manifest)) => (
                        PluginDescriptor::from_manifest(&key, &manifest),
                        PluginState::Loaded,
                    ),
                    Err(e) => (
                        PluginDescriptor::unnamed(&key, plugin_type.short_name()),
                        PluginState::Failed {
                            error: e.to_string(),
                        },
                    ),
                };

                let entry = DiscoveredPlugin {
                    descriptor,
                    source: source.clone(),
                    state,
                };
                match found.iter_mut().find(|p| p.descriptor.key == entry.descriptor.key) {
                    Some(existing) => *existing = entry,
                    None => found.push(entry),
                }
            }
        }

        found
    }

    /// Built-in units followed by every library in the plugin directory
    fn units(&self) -> Vec<LoadUnit> {
        let mut units = self.built_in.clone();

        for path in self.scan() {
            match LoadUnit::open(&path) {
                Ok(unit) => {
                    debug!(
                        path = %path.display(),
                        types = unit.types().len(),
                        "Opened plugin library"
                    );
                    units.push(unit);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to load plugin library");
                }
            }
        }

        units
    }

    /// Library files directly in the plugin directory, sorted by name.
    /// Creates the directory if it is missing.
    fn scan(&self) -> Vec<PathBuf> {
        if let Err(source) = std::fs::create_dir_all(&self.plugin_dir) {
            let e = PluginHostError::PluginDir {
                path: self.plugin_dir.clone(),
                source,
            };
            error!(error = %e, "Skipping plugin directory");
            return Vec::new();
        }

        let entries = match std::fs::read_dir(&self.plugin_dir) {
            Ok(entries) => entries,
            Err(source) => {
                let e = PluginHostError::PluginDir {
                    path: self.plugin_dir.clone(),
                    source,
                };
                error!(error = %e, "Skipping plugin directory");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_library(path))
            .collect();
        paths.sort();
        paths
    }
}

/// Instantiate a plugin type and read its manifest, catching panics
fn create(plugin_type: &PluginType) -> Result<(Box<dyn Plugin>, PluginManifest), PluginHostError> {
    std::panic::catch_unwind(|| {
        let instance = (plugin_type.create)();
        let manifest = instance.manifest();
        (instance, manifest)
    })
    .map_err(|_| PluginHostError::Panicked {
        name: plugin_type.short_name().to_string(),
        hook: "create",
    })
}

fn load_plugin(
    unit: &LoadUnit,
    plugin_type: &PluginType,
    key: String,
    context: PluginContext,
) -> PluginSlot {
    let (instance, manifest) = match create(plugin_type) {
        Ok(created) => created,
        Err(e) => {
            error!(plugin = %key, error = %e, "Failed to create plugin");
            let descriptor = PluginDescriptor::unnamed(key, plugin_type.short_name());
            return PluginSlot::failed(descriptor, context, e.to_string());
        }
    };

    let mut plugin = LoadedPlugin::new(instance, unit.library());
    let descriptor = PluginDescriptor::from_manifest(key, &manifest);

    let init = std::panic::catch_unwind(AssertUnwindSafe(|| {
        plugin.instance_mut().initialize(&context)
    }));

    let error = match init {
        Ok(Ok(())) => {
            debug!(plugin = %descriptor.key, version = %descriptor.version, "Plugin initialized");
            return PluginSlot::loaded(descriptor, context, plugin);
        }
        Ok(Err(e)) => PluginHostError::InitFailed(e),
        Err(_) => PluginHostError::Panicked {
            name: descriptor.name.clone(),
            hook: "initialize",
        },
    };

    error!(
        plugin = %descriptor.key,
        name = %descriptor.name,
        error = %error,
        "Failed to initialize plugin"
    );
    PluginSlot::failed(descriptor, context, error.to_string())
}
