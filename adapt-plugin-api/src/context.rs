//! PluginContext - a plugin's interface to the host

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::HookResult;
use crate::command::RegisteredCommand;
use crate::error::PluginError;
use crate::listener::{CommandCall, CommandFuture, CommandHandler, CommandListener, CommandListeners};
use crate::session::SessionHandle;
use crate::settings::{
    ErasedBlock, ErasedTenantMap, GlobalSettings, SettingsBlock, SettingsStore, TenantSettings,
};
use crate::types::{Tenant, TenantId};

/// Plugin's interface to the host.
///
/// Handed to [`Plugin::initialize`](crate::Plugin::initialize) and to every
/// hook. It provides:
/// - settings registration and persistence, keyed by this plugin's identity
/// - the current tenant list
/// - the session handle for remote calls
/// - listeners for the commands the plugin created
/// - logging prefixed with the plugin key
///
/// Cloning is cheap; plugins may keep a clone for background tasks.
#[derive(Clone)]
pub struct PluginContext {
    plugin_key: String,
    settings: Arc<dyn SettingsStore>,
    session: Arc<dyn SessionHandle>,
    listeners: Arc<CommandListeners>,
}

impl PluginContext {
    /// Create a context for the plugin identified by `plugin_key`
    pub fn new(
        plugin_key: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
        session: Arc<dyn SessionHandle>,
    ) -> Self {
        Self {
            plugin_key: plugin_key.into(),
            settings,
            session,
            listeners: Arc::default(),
        }
    }

    /// Builder: attach listeners to the host's shared listener set
    pub fn with_listeners(mut self, listeners: Arc<CommandListeners>) -> Self {
        self.listeners = listeners;
        self
    }

    /// The key this plugin was loaded under
    pub fn plugin_key(&self) -> &str {
        &self.plugin_key
    }

    // ─── Settings ────────────────────────────────────────────────────

    /// Register this plugin's global settings block.
    ///
    /// If the settings document holds a block for this plugin it is
    /// deserialized into `T`; otherwise `default` is stored and persisted.
    /// Calling this again returns the same block, not a fresh default.
    ///
    /// # Example
    /// ```ignore
    /// self.settings = Some(ctx.register_global(StatusSettings::default())?);
    /// ```
    pub fn register_global<T: SettingsBlock>(
        &self,
        default: T,
    ) -> Result<GlobalSettings<T>, PluginError> {
        let default: Arc<dyn ErasedBlock> = Arc::new(RwLock::new(default));
        let decode = |value: serde_json::Value| -> Result<Arc<dyn ErasedBlock>, serde_json::Error> {
            let block: T = serde_json::from_value(value)?;
            Ok(Arc::new(RwLock::new(block)))
        };

        let block = self
            .settings
            .register_global(&self.plugin_key, default, &decode);

        block
            .into_any()
            .downcast::<RwLock<T>>()
            .map(GlobalSettings::from_shared)
            .map_err(|_| {
                PluginError::Settings(format!(
                    "global settings for '{}' were registered with a different type",
                    self.plugin_key
                ))
            })
    }

    /// Register this plugin's per-tenant settings.
    ///
    /// The host fills the returned map for every tenant it knows about,
    /// loading persisted entries or creating defaults.
    pub fn register_tenant_settings<T: SettingsBlock>(
        &self,
    ) -> Result<TenantSettings<T>, PluginError> {
        let map: Arc<dyn ErasedTenantMap> = Arc::new(RwLock::new(BTreeMap::<TenantId, T>::new()));
        let map = self
            .settings
            .register_tenant_settings(&self.plugin_key, map);

        map.into_any()
            .downcast::<RwLock<BTreeMap<TenantId, T>>>()
            .map(TenantSettings::from_shared)
            .map_err(|_| {
                PluginError::Settings(format!(
                    "tenant settings for '{}' were registered with a different type",
                    self.plugin_key
                ))
            })
    }

    /// Persist all settings (global document and tenant files)
    pub fn save_settings(&self) {
        self.settings.save();
    }

    // ─── Session ─────────────────────────────────────────────────────

    /// Tenants the bot is currently a member of
    pub fn tenants(&self) -> Vec<Tenant> {
        self.session.tenants()
    }

    /// The session handle for remote calls
    pub fn session(&self) -> &dyn SessionHandle {
        self.session.as_ref()
    }

    // ─── Command listeners ───────────────────────────────────────────

    /// Run `handler` whenever `command` is invoked
    pub fn listen<F, Fut>(&self, command: &RegisteredCommand, handler: F)
    where
        F: Fn(CommandCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.add_listener(command, BTreeSet::new(), handler);
    }

    /// Run `handler` when `command` is invoked with every one of `options`.
    ///
    /// Fails if `options` is empty or names an option the command does not
    /// declare.
    pub fn listen_options<F, Fut>(
        &self,
        command: &RegisteredCommand,
        options: &[&str],
        handler: F,
    ) -> Result<(), PluginError>
    where
        F: Fn(CommandCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        if options.is_empty() || options.iter().any(|o| o.trim().is_empty()) {
            return Err(PluginError::InvalidInput(format!(
                "listening to '{}' needs at least one option name",
                command.name
            )));
        }

        let options: BTreeSet<String> = options.iter().map(|o| o.to_lowercase()).collect();
        if let Some(missing) = options.iter().find(|o| !command.has_option(o)) {
            return Err(PluginError::InvalidInput(format!(
                "command '{}' has no option '{missing}'",
                command.name
            )));
        }

        self.add_listener(command, options, handler);
        Ok(())
    }

    fn add_listener<F, Fut>(&self, command: &RegisteredCommand, options: BTreeSet<String>, handler: F)
    where
        F: Fn(CommandCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        let handler: CommandHandler =
            Arc::new(move |call: CommandCall| -> CommandFuture { Box::pin(handler(call)) });
        self.listeners.add(
            command.id,
            CommandListener::new(self.plugin_key.clone(), options, handler),
        );
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically tagged with the plugin key)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_key, "{}", message);
    }

    /// Log a warning message
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_key, "{}", message);
    }

    /// Log an error message
    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_key, "{}", message);
    }

    /// Log a debug message
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_key, "{}", message);
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_key", &self.plugin_key)
            .finish_non_exhaustive()
    }
}
