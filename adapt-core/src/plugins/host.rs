//! PluginHost - connection bootstrap and the event loop

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use adapt_plugin_api::{PluginContext, PluginType, SessionHandle, SettingsStore, TenantId};
use tracing::{debug, error, info, warn};

use super::commands::CommandLifecycle;
use super::dispatch::{DispatchStrategy, Dispatcher, Hook};
use super::loader::PluginLoader;
use super::registry::ComponentRegistry;
use crate::error::AdaptError;
use crate::session::{GatewayEvent, Session, SessionError, SessionFactory};
use crate::settings::SettingsRegistry;

/// Configuration for PluginHost
#[derive(Debug, Clone)]
pub struct PluginHostConfig {
    /// Directory scanned for plugin libraries (~/.config/adapt/plugins)
    pub plugin_dir: PathBuf,
    /// Directory holding the settings files (~/.local/share/adapt)
    pub data_dir: PathBuf,
    /// How events are fanned out
    pub dispatch: DispatchStrategy,
    /// Fail hooks that run longer than this
    pub hook_timeout: Option<Duration>,
    /// Register the `refresh-commands` command
    pub refresh_command: bool,
    /// Delete a tenant's settings when the bot leaves it
    pub purge_settings_on_leave: bool,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: adapt_paths::plugin_dir(),
            data_dir: adapt_paths::data_dir(),
            dispatch: DispatchStrategy::default(),
            hook_timeout: None,
            refresh_command: true,
            purge_settings_on_leave: false,
        }
    }
}

/// A started session and the plugins wired to it
struct Connection {
    session: Arc<dyn Session>,
    handle: Arc<dyn SessionHandle>,
    dispatcher: Dispatcher,
}

/// Owns the settings registry, loads plugins and drives them from a session
pub struct PluginHost {
    config: PluginHostConfig,
    settings: Arc<SettingsRegistry>,
    loader: PluginLoader,
    commands: CommandLifecycle,
    tenants_registered: AtomicBool,
    connection: Option<Connection>,
}

impl PluginHost {
    /// Create a host; loads the settings document from `config.data_dir`
    pub fn new(config: PluginHostConfig) -> Self {
        let settings = Arc::new(SettingsRegistry::load_dir(&config.data_dir));
        let loader = PluginLoader::new(&config.plugin_dir);
        let commands = CommandLifecycle::new(config.refresh_command);

        Self {
            config,
            settings,
            loader,
            commands,
            tenants_registered: AtomicBool::new(false),
            connection: None,
        }
    }

    /// Builder: register plugins compiled into the host
    pub fn with_built_in(mut self, key: impl Into<String>, types: &[PluginType]) -> Self {
        self.loader.add_built_in(key, types);
        self
    }

    pub fn config(&self) -> &PluginHostConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<SettingsRegistry> {
        &self.settings
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn commands(&self) -> &CommandLifecycle {
        &self.commands
    }

    /// Loaded plugins, once connected
    pub fn registry(&self) -> Option<&Arc<ComponentRegistry>> {
        self.connection.as_ref().map(|c| c.dispatcher.registry())
    }

    /// The dispatcher, once connected
    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.connection.as_ref().map(|c| &c.dispatcher)
    }

    /// The session, once connected
    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.connection.as_ref().map(|c| &c.session)
    }

    /// Build the session, load plugins against it and start it.
    ///
    /// Returns `Ok(false)` without creating a session when no bot token is
    /// configured. A session that fails to start is logged and returned as
    /// an error.
    pub async fn initialize_connection(
        &mut self,
        factory: &dyn SessionFactory,
    ) -> Result<bool, AdaptError> {
        let Some(token) = self.settings.bot_token() else {
            warn!(
                path = %self.settings.layout().global_file.display(),
                "Please set a valid Discord bot token!"
            );
            warn!("Discord connection aborted!");
            return Ok(false);
        };

        if self.connection.is_some() {
            return Err(SessionError::AlreadyStarted.into());
        }

        let session = factory.create();
        let handle = Arc::clone(&session).as_handle();
        let store: Arc<dyn SettingsStore> = self.settings.clone();
        let listeners = Arc::clone(self.commands.listeners());

        let registry = self.loader.load_all(|key| {
            PluginContext::new(key, Arc::clone(&store), Arc::clone(&handle))
                .with_listeners(Arc::clone(&listeners))
        });
        let dispatcher = Dispatcher::new(Arc::new(registry))
            .with_strategy(self.config.dispatch)
            .with_hook_timeout(self.config.hook_timeout);

        if let Err(e) = session.start(&token).await {
            error!(error = %e, "Failed to start the session");
            return Err(e.into());
        }

        info!(
            plugins = dispatcher.registry().present_count(),
            strategy = ?self.config.dispatch,
            "Session started"
        );
        self.connection = Some(Connection {
            session,
            handle,
            dispatcher,
        });
        Ok(true)
    }

    /// Consume session events until the session closes
    pub async fn run(&self) -> Result<(), AdaptError> {
        let connection = self.connection()?;
        let mut events = connection
            .session
            .take_events()
            .ok_or(SessionError::EventsTaken)?;

        info!("Listening for events");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await?;
        }
        info!("Session closed");
        Ok(())
    }

    /// Run one dispatch cycle for an event
    pub async fn handle_event(&self, event: GatewayEvent) -> Result<(), AdaptError> {
        let connection = self.connection()?;
        let dispatcher = &connection.dispatcher;
        debug!(event = event.name(), "Dispatching event");

        match event {
            GatewayEvent::Ready => {
                if !self.tenants_registered.swap(true, Ordering::SeqCst) {
                    for tenant in connection.handle.tenants() {
                        self.register_tenant(tenant.id);
                    }
                }
                // Commands exist before plugins see Ready
                self.commands
                    .on_ready(connection.handle.as_ref(), dispatcher)
                    .await;
                dispatcher.invoke_all(Hook::Ready).await;
            }
            GatewayEvent::TenantJoined(tenant) => {
                self.register_tenant(tenant.id);
                dispatcher.invoke_all(Hook::TenantJoined(tenant)).await;
            }
            GatewayEvent::TenantLeft(tenant) => {
                let id = tenant.id;
                dispatcher.invoke_all(Hook::TenantLeft(tenant)).await;
                if self.config.purge_settings_on_leave {
                    if let Err(e) = self.settings.purge_tenant(id) {
                        error!(tenant = id, error = %e, "Failed to purge tenant settings");
                    }
                }
            }
            GatewayEvent::InteractionCreated(interaction) => {
                self.commands
                    .route_interaction(interaction, connection.handle.as_ref(), dispatcher)
                    .await;
            }
            event => {
                dispatcher.invoke_all(Hook::from(event)).await;
            }
        }
        Ok(())
    }

    fn register_tenant(&self, tenant: TenantId) {
        match self.settings.register_tenant(tenant) {
            Ok(report) if !report.is_ok() => {
                warn!(tenant, failed = report.failed.len(), "Some tenant settings were not saved");
            }
            Ok(_) => debug!(tenant, "Registered tenant"),
            Err(e) => error!(tenant, error = %e, "Failed to register tenant for settings"),
        }
    }

    fn connection(&self) -> Result<&Connection, AdaptError> {
        self.connection.as_ref().ok_or(AdaptError::NotConnected)
    }
}
