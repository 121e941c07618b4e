//! ComponentRegistry - the ordered set of loaded plugins

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use adapt_plugin_api::{Plugin, PluginContext, PluginManifest};
use libloading::Library;
use serde::Serialize;

/// A plugin instance shared between the registry and dispatch tasks
pub type SharedPlugin = Arc<tokio::sync::Mutex<LoadedPlugin>>;

/// A plugin instance and the library its code lives in
pub struct LoadedPlugin {
    /// The plugin instance
    instance: Box<dyn Plugin>,
    /// Keep the library loaded; dropped after `instance`
    _library: Option<Arc<Library>>,
}

impl LoadedPlugin {
    /// Wrap an instance; `library` is `None` for built-in plugins
    pub fn new(instance: Box<dyn Plugin>, library: Option<Arc<Library>>) -> Self {
        Self {
            instance,
            _library: library,
        }
    }

    /// Share the instance for dispatch
    pub fn shared(self) -> SharedPlugin {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// The plugin instance
    pub fn instance_mut(&mut self) -> &mut dyn Plugin {
        self.instance.as_mut()
    }
}

impl Drop for LoadedPlugin {
    fn drop(&mut self) {
        // Dispose before the library is unloaded so the plugin can release
        // anything that refers to code in it.
        let instance = &mut self.instance;
        if std::panic::catch_unwind(AssertUnwindSafe(|| instance.dispose())).is_err() {
            tracing::warn!(plugin = %instance.manifest().name, "Plugin panicked in dispose");
        }
    }
}

/// Identity and metadata of a plugin. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    /// Stable key derived from the load unit
    pub key: String,
    /// Display name from the manifest
    pub name: String,
    /// Description from the manifest
    pub description: String,
    /// Version from the manifest
    pub version: String,
}

impl PluginDescriptor {
    /// Descriptor from a plugin's manifest
    pub fn from_manifest(key: impl Into<String>, manifest: &PluginManifest) -> Self {
        Self {
            key: key.into(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            version: manifest.version.clone(),
        }
    }

    /// Descriptor for a plugin that could not be created; named after its type
    pub fn unnamed(key: impl Into<String>, type_name: &str) -> Self {
        Self {
            key: key.into(),
            name: type_name.to_string(),
            description: String::new(),
            version: String::new(),
        }
    }
}

/// State of a registry slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PluginState {
    /// Plugin is loaded and receives events
    Loaded,
    /// Plugin failed to construct or initialize; it receives nothing
    Failed { error: String },
}

/// One registry entry. The instance is absent when the plugin failed to load.
pub struct PluginSlot {
    pub descriptor: PluginDescriptor,
    pub context: PluginContext,
    pub state: PluginState,
    instance: Option<SharedPlugin>,
}

impl PluginSlot {
    /// A slot holding a live instance
    pub fn loaded(descriptor: PluginDescriptor, context: PluginContext, plugin: LoadedPlugin) -> Self {
        Self {
            descriptor,
            context,
            state: PluginState::Loaded,
            instance: Some(plugin.shared()),
        }
    }

    /// A known but broken plugin
    pub fn failed(
        descriptor: PluginDescriptor,
        context: PluginContext,
        error: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            context,
            state: PluginState::Failed {
                error: error.into(),
            },
            instance: None,
        }
    }

    /// The shared instance, if present
    pub fn instance(&self) -> Option<&SharedPlugin> {
        self.instance.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.instance.is_some()
    }
}

impl std::fmt::Debug for PluginSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSlot")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Ordered mapping of plugin key to slot.
///
/// Iteration follows insertion order. Inserting an existing key replaces
/// that slot in place and records the key as a collision.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    slots: Vec<PluginSlot>,
    index: HashMap<String, usize>,
    collisions: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, returning the slot it replaced
    pub fn insert(&mut self, slot: PluginSlot) -> Option<PluginSlot> {
        match self.index.get(&slot.descriptor.key) {
            Some(&position) => {
                self.collisions.push(slot.descriptor.key.clone());
                Some(std::mem::replace(&mut self.slots[position], slot))
            }
            None => {
                self.index
                    .insert(slot.descriptor.key.clone(), self.slots.len());
                self.slots.push(slot);
                None
            }
        }
    }

    /// Keys that were inserted more than once, once per replacement
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    /// All slots, in insertion order
    pub fn all(&self) -> &[PluginSlot] {
        &self.slots
    }

    /// Slots with a live instance, in insertion order
    pub fn present(&self) -> impl Iterator<Item = (&PluginSlot, &SharedPlugin)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.instance().map(|instance| (slot, instance)))
    }

    pub fn get(&self, key: &str) -> Option<&PluginSlot> {
        self.index.get(key).map(|&position| &self.slots[position])
    }

    /// Whether a slot exists for the key, present or not
    pub fn is_known(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots with a live instance
    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_present()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalSession;
    use crate::settings::SettingsRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Disposable {
        name: &'static str,
        disposed: Arc<AtomicUsize>,
    }

    impl Plugin for Disposable {
        fn manifest(&self) -> PluginManifest {
            PluginManifest {
                name: self.name.to_string(),
                description: "Counts disposals".to_string(),
                ..Default::default()
            }
        }

        fn dispose(&mut self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context(dir: &TempDir, key: &str) -> PluginContext {
        PluginContext::new(
            key,
            Arc::new(SettingsRegistry::load_dir(dir.path())),
            Arc::new(LocalSession::new()),
        )
    }

    fn slot(dir: &TempDir, key: &str, name: &'static str, disposed: &Arc<AtomicUsize>) -> PluginSlot {
        let plugin = Disposable {
            name,
            disposed: Arc::clone(disposed),
        };
        let descriptor = PluginDescriptor::from_manifest(key, &plugin.manifest());
        PluginSlot::loaded(
            descriptor,
            context(dir, key),
            LoadedPlugin::new(Box::new(plugin), None),
        )
    }

    #[test]
    fn test_registry_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let disposed = Arc::new(AtomicUsize::new(0));
        let mut registry = ComponentRegistry::new();
        registry.insert(slot(&dir, "c", "C", &disposed));
        registry.insert(slot(&dir, "a", "A", &disposed));
        registry.insert(PluginSlot::failed(
            PluginDescriptor::unnamed("b", "Broken"),
            context(&dir, "b"),
            "init failed",
        ));

        let keys: Vec<_> = registry.all().iter().map(|s| s.descriptor.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.present_count(), 2);
        assert!(registry.is_known("b"));
        assert!(!registry.get("b").unwrap().is_present());
        assert_eq!(registry.present().count(), 2);
    }

    #[test]
    fn test_insert_existing_key_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let disposed = Arc::new(AtomicUsize::new(0));
        let mut registry = ComponentRegistry::new();
        registry.insert(slot(&dir, "x", "First", &disposed));
        registry.insert(slot(&dir, "y", "Other", &disposed));

        let replaced = registry.insert(slot(&dir, "x", "Second", &disposed));
        assert_eq!(replaced.as_ref().map(|s| s.descriptor.name.as_str()), Some("First"));
        drop(replaced);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].descriptor.name, "Second");
        assert_eq!(registry.get("x").unwrap().descriptor.name, "Second");
        assert_eq!(registry.collisions(), ["x"]);
    }

    #[test]
    fn test_dropping_registry_disposes_instances() {
        let dir = TempDir::new().unwrap();
        let disposed = Arc::new(AtomicUsize::new(0));
        let mut registry = ComponentRegistry::new();
        registry.insert(slot(&dir, "a", "A", &disposed));
        registry.insert(slot(&dir, "b", "B", &disposed));

        drop(registry);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_state_serializes_with_error() {
        let json = serde_json::to_value(PluginState::Failed {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "boom");
    }
}
