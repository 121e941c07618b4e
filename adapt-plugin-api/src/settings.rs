//! Typed settings handles and the type-erased store interface behind them
//!
//! A plugin registers a global block and/or a per-tenant map through its
//! [`PluginContext`](crate::PluginContext). The host persists them; the plugin
//! only ever sees [`GlobalSettings<T>`] and [`TenantSettings<T>`].

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::TenantId;

/// Types usable as a settings block
pub trait SettingsBlock: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> SettingsBlock for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// A registered global block, viewed without its concrete type
pub trait ErasedBlock: Send + Sync {
    /// Serialize the current value
    fn to_value(&self) -> Result<Value, serde_json::Error>;

    /// Recover the concrete `RwLock<T>` via `Arc::downcast`
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: SettingsBlock> ErasedBlock for RwLock<T> {
    fn to_value(&self) -> Result<Value, serde_json::Error> {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_value(&*guard)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A registered tenant map, viewed without its concrete type
pub trait ErasedTenantMap: Send + Sync {
    /// Whether an entry exists for the tenant
    fn contains(&self, tenant: TenantId) -> bool;

    /// Deserialize a persisted entry and store it for the tenant
    fn load(&self, tenant: TenantId, value: Value) -> Result<(), serde_json::Error>;

    /// Store a default entry for the tenant
    fn insert_default(&self, tenant: TenantId);

    /// Remove the tenant's entry, returning whether it existed
    fn remove(&self, tenant: TenantId) -> bool;

    /// Serialize every entry, ordered by tenant id
    fn snapshot(&self) -> Vec<(TenantId, Result<Value, serde_json::Error>)>;

    /// Recover the concrete map via `Arc::downcast`
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: SettingsBlock> ErasedTenantMap for RwLock<BTreeMap<TenantId, T>> {
    fn contains(&self, tenant: TenantId) -> bool {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&tenant)
    }

    fn load(&self, tenant: TenantId, value: Value) -> Result<(), serde_json::Error> {
        let entry: T = serde_json::from_value(value)?;
        self.write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant, entry);
        Ok(())
    }

    fn insert_default(&self, tenant: TenantId) {
        self.write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant, T::default());
    }

    fn remove(&self, tenant: TenantId) -> bool {
        self.write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tenant)
            .is_some()
    }

    fn snapshot(&self) -> Vec<(TenantId, Result<Value, serde_json::Error>)> {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(tenant, entry)| (*tenant, serde_json::to_value(entry)))
            .collect()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Decoder from a persisted value into a typed block
pub type DecodeBlock<'a> =
    &'a dyn Fn(Value) -> Result<Arc<dyn ErasedBlock>, serde_json::Error>;

/// The host side of settings registration.
///
/// Implemented by the host's settings registry. Plugins go through
/// [`PluginContext`](crate::PluginContext) rather than calling this directly.
pub trait SettingsStore: Send + Sync {
    /// Register the global block for `key`.
    ///
    /// Returns the block already registered under `key` if there is one,
    /// otherwise the decoded persisted value, otherwise `default`.
    fn register_global(
        &self,
        key: &str,
        default: Arc<dyn ErasedBlock>,
        decode: DecodeBlock<'_>,
    ) -> Arc<dyn ErasedBlock>;

    /// Register the tenant map for `key`. The first registration wins and is returned.
    fn register_tenant_settings(
        &self,
        key: &str,
        map: Arc<dyn ErasedTenantMap>,
    ) -> Arc<dyn ErasedTenantMap>;

    /// Persist everything
    fn save(&self);
}

/// Shared handle to a plugin's global settings block.
///
/// Every registration of the same key within one process returns a handle to
/// the same block; [`GlobalSettings::ptr_eq`] checks that identity.
#[derive(Debug)]
pub struct GlobalSettings<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for GlobalSettings<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SettingsBlock> GlobalSettings<T> {
    pub(crate) fn from_shared(inner: Arc<RwLock<T>>) -> Self {
        Self { inner }
    }

    /// Run `f` on the block.
    ///
    /// The block is locked while `f` runs, so `f` must not save settings.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Mutate the block. Call `save_settings` afterwards to persist.
    ///
    /// The block is locked while `f` runs, so `f` must not save settings.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Replace the block
    pub fn set(&self, value: T) {
        self.update(|block| *block = value);
    }

    /// Whether both handles point at the same block
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: SettingsBlock + Clone> GlobalSettings<T> {
    /// Clone out the current value
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

/// Shared handle to a plugin's per-tenant settings
#[derive(Debug)]
pub struct TenantSettings<T> {
    inner: Arc<RwLock<BTreeMap<TenantId, T>>>,
}

impl<T> Clone for TenantSettings<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SettingsBlock> TenantSettings<T> {
    pub(crate) fn from_shared(inner: Arc<RwLock<BTreeMap<TenantId, T>>>) -> Self {
        Self { inner }
    }

    /// Run `f` on the tenant's settings, if the host knows the tenant
    pub fn with<R>(&self, tenant: TenantId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&tenant).map(f)
    }

    /// Run `f` on the tenant's settings mutably, if the host knows the tenant
    pub fn update<R>(&self, tenant: TenantId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.get_mut(&tenant).map(f)
    }

    /// Whether the tenant has an entry
    pub fn contains(&self, tenant: TenantId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&tenant)
    }

    /// Tenants with an entry, in ascending order
    pub fn tenants(&self) -> Vec<TenantId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Whether both handles point at the same map
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: SettingsBlock + Clone> TenantSettings<T> {
    /// Clone out the tenant's settings
    pub fn get(&self, tenant: TenantId) -> Option<T> {
        self.with(tenant, T::clone)
    }
}
