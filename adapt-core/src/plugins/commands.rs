//! Command lifecycle - one-time command creation, refresh and routing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use adapt_plugin_api::{
    CommandInvocation, CommandListeners, CommandSpec, Interaction, RegisteredCommand,
    SessionHandle,
};
use tracing::{debug, error, info, warn};

use super::dispatch::{DispatchReport, Dispatcher, Hook};

/// Name of the host-owned refresh command
pub const REFRESH_COMMAND_NAME: &str = "refresh-commands";

/// Description of the refresh command
pub const REFRESH_COMMAND_DESCRIPTION: &str =
    "Deletes all commands and forces the plugins to re-register their commands.";

/// Acknowledgment sent after a successful refresh
pub const REFRESH_DONE: &str = "All commands refreshed!";

/// Acknowledgment sent when some commands could not be listed for deletion
pub const REFRESH_FAILED: &str = "Refreshing commands failed.";

/// What a refresh did
#[derive(Debug)]
pub struct RefreshReport {
    /// Global commands deleted
    pub deleted_global: usize,
    /// Tenant commands deleted, across all tenants
    pub deleted_tenant: usize,
    /// Commands whose deletion failed
    pub failed_deletes: usize,
    /// Scopes (global, or one tenant) whose commands could not be listed
    pub failed_listings: usize,
    /// The `CreateCommands` fan-out that followed
    pub recreated: DispatchReport,
}

impl RefreshReport {
    /// Whether every scope could be listed
    pub fn listed_everything(&self) -> bool {
        self.failed_listings == 0
    }
}

/// How an interaction was handled
#[derive(Debug)]
pub enum InteractionOutcome {
    /// Not a command; only `on_interaction_created` ran
    Interaction,
    /// A plugin command: its listeners ran, then `on_command_received`
    Command {
        listeners: DispatchReport,
        received: DispatchReport,
    },
    /// The refresh command
    Refresh(RefreshReport),
}

/// Owns the "commands created" latch, the refresh command and the command
/// listeners plugins attach.
///
/// ```text
/// Uninitialized --first Ready--> CommandsCreated --refresh--> CommandsCreated
/// ```
pub struct CommandLifecycle {
    refresh_enabled: bool,
    commands_created: AtomicBool,
    refresh_command: Mutex<Option<RegisteredCommand>>,
    listeners: Arc<CommandListeners>,
}

impl CommandLifecycle {
    /// Create the lifecycle; `refresh_enabled` controls whether the
    /// refresh command is registered
    pub fn new(refresh_enabled: bool) -> Self {
        Self {
            refresh_enabled,
            commands_created: AtomicBool::new(false),
            refresh_command: Mutex::new(None),
            listeners: Arc::default(),
        }
    }

    /// Whether commands were created in this process
    pub fn commands_created(&self) -> bool {
        self.commands_created.load(Ordering::SeqCst)
    }

    /// Listeners shared with every plugin context
    pub fn listeners(&self) -> &Arc<CommandListeners> {
        &self.listeners
    }

    /// The refresh command, once created
    pub fn refresh_command(&self) -> Option<RegisteredCommand> {
        self.refresh_command
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the invocation targets the refresh command
    pub fn is_refresh(&self, invocation: &CommandInvocation) -> bool {
        self.refresh_command()
            .is_some_and(|command| command.id == invocation.command_id)
    }

    /// Create commands on the first `Ready` only.
    ///
    /// Returns the `CreateCommands` report, or `None` when commands were
    /// already created (a reconnect).
    pub async fn on_ready(
        &self,
        session: &dyn SessionHandle,
        dispatcher: &Dispatcher,
    ) -> Option<DispatchReport> {
        if self.commands_created.swap(true, Ordering::SeqCst) {
            debug!("Commands already created, skipping");
            return None;
        }

        if self.refresh_enabled {
            let spec = CommandSpec::new(REFRESH_COMMAND_NAME, REFRESH_COMMAND_DESCRIPTION);
            match session.create_global_command(spec).await {
                Ok(command) => {
                    debug!(id = %command.id, "Created refresh command");
                    *self
                        .refresh_command
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(command);
                }
                Err(e) => error!(error = %e, "Failed to create refresh command"),
            }
        }

        Some(dispatcher.invoke_ordered(Hook::CreateCommands).await)
    }

    /// Delete every command except the refresh command and let plugins
    /// create theirs again.
    ///
    /// Deletion is best effort: a scope that cannot be listed or a command
    /// that cannot be deleted is logged, counted and skipped. Listeners are
    /// dropped and `CreateCommands` always runs afterwards.
    pub async fn refresh(
        &self,
        session: &dyn SessionHandle,
        dispatcher: &Dispatcher,
    ) -> RefreshReport {
        info!("A client requested the refreshing of all commands");
        let refresh_id = self.refresh_command().map(|command| command.id);
        let mut deleted_global = 0;
        let mut deleted_tenant = 0;
        let mut failed_deletes = 0;
        let mut failed_listings = 0;

        match session.global_commands().await {
            Ok(commands) => {
                let commands: Vec<RegisteredCommand> = commands
                    .into_iter()
                    .filter(|command| Some(command.id) != refresh_id)
                    .collect();
                info!(count = commands.len(), "Deleting global commands");
                for command in &commands {
                    match session.delete_command(command).await {
                        Ok(()) => deleted_global += 1,
                        Err(e) => {
                            warn!(
                                command = %command.name,
                                error = %e,
                                "Failed to delete global command"
                            );
                            failed_deletes += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to list global commands");
                failed_listings += 1;
            }
        }

        for tenant in session.tenants() {
            let commands = match session.tenant_commands(tenant.id).await {
                Ok(commands) => commands,
                Err(e) => {
                    error!(tenant = tenant.id, error = %e, "Failed to list tenant commands");
                    failed_listings += 1;
                    continue;
                }
            };
            info!(
                tenant = tenant.id,
                name = %tenant.name,
                count = commands.len(),
                "Deleting tenant commands"
            );
            for command in &commands {
                match session.delete_command(command).await {
                    Ok(()) => deleted_tenant += 1,
                    Err(e) => {
                        warn!(
                            tenant = tenant.id,
                            command = %command.name,
                            error = %e,
                            "Failed to delete tenant command"
                        );
                        failed_deletes += 1;
                    }
                }
            }
        }

        if failed_listings == 0 {
            info!("Successfully cleared all commands");
        } else {
            error!(failed_listings, "Error during command clearing");
        }

        debug!(listeners = self.listeners.len(), "Dropping command listeners");
        self.listeners.clear();

        info!("Invoking create_commands for all plugins");
        let recreated = dispatcher.invoke_ordered(Hook::CreateCommands).await;
        RefreshReport {
            deleted_global,
            deleted_tenant,
            failed_deletes,
            failed_listings,
            recreated,
        }
    }

    /// Route an interaction.
    ///
    /// Every interaction is fanned out as `on_interaction_created` first.
    /// The refresh command is then handled here and acknowledged. Any other
    /// command runs its listeners and is then fanned out as
    /// `on_command_received`.
    pub async fn route_interaction(
        &self,
        interaction: Interaction,
        session: &dyn SessionHandle,
        dispatcher: &Dispatcher,
    ) -> InteractionOutcome {
        dispatcher
            .invoke_all(Hook::InteractionCreated(interaction.clone()))
            .await;

        let Some(invocation) = interaction.command().cloned() else {
            return InteractionOutcome::Interaction;
        };

        if self.is_refresh(&invocation) {
            let report = self.refresh(session, dispatcher).await;
            let ack = if report.listed_everything() {
                REFRESH_DONE
            } else {
                REFRESH_FAILED
            };
            if let Err(e) = session.respond(interaction.id, ack).await {
                error!(error = %e, "Failed to acknowledge refresh");
            }
            return InteractionOutcome::Refresh(report);
        }

        let listeners = dispatcher
            .invoke_listeners(
                self.listeners.matching(&invocation),
                interaction.clone(),
                invocation.clone(),
            )
            .await;
        let received = dispatcher
            .invoke_all(Hook::CommandReceived {
                interaction,
                invocation,
            })
            .await;
        InteractionOutcome::Command {
            listeners,
            received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::{ComponentRegistry, LoadedPlugin, PluginDescriptor, PluginSlot};
    use crate::session::LocalSession;
    use crate::settings::SettingsRegistry;
    use adapt_plugin_api::{
        CommandCall, CommandClient, CommandId, HookResult, InteractionKind, OptionKind,
        OptionSpec, Plugin, PluginContext, PluginManifest, Tenant, User, async_trait,
    };
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Creates a global `ping` and a `local` command per tenant. Listens on
    /// `local`, once plainly and once for its `loud` option.
    struct Pinger {
        received: Log,
    }

    #[async_trait]
    impl Plugin for Pinger {
        fn manifest(&self) -> PluginManifest {
            PluginManifest {
                name: "Pinger".into(),
                ..Default::default()
            }
        }

        async fn create_commands(
            &mut self,
            commands: &dyn CommandClient,
            ctx: &PluginContext,
        ) -> HookResult {
            commands
                .create_global_command(CommandSpec::new("ping", "Ping"))
                .await?;
            for tenant in ctx.tenants() {
                let spec = CommandSpec::new("local", "Local").with_option(OptionSpec {
                    name: "loud".into(),
                    description: "Shout".into(),
                    kind: OptionKind::Boolean,
                    required: false,
                });
                let local = commands.create_tenant_command(tenant.id, spec).await?;

                let log = Arc::clone(&self.received);
                ctx.listen(&local, move |call: CommandCall| {
                    log.lock().unwrap().push(format!("listener:{}", call.invocation.name));
                    async { HookResult::Ok(()) }
                });
                let log = Arc::clone(&self.received);
                ctx.listen_options(&local, &["loud"], move |_call: CommandCall| {
                    log.lock().unwrap().push("listener:loud".to_string());
                    async { HookResult::Ok(()) }
                })?;
            }
            Ok(())
        }

        async fn on_command_received(
            &mut self,
            _interaction: &Interaction,
            invocation: &CommandInvocation,
            _ctx: &PluginContext,
        ) -> HookResult {
            self.received
                .lock()
                .unwrap()
                .push(format!("received:{}", invocation.name));
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        session: Arc<LocalSession>,
        dispatcher: Dispatcher,
        lifecycle: CommandLifecycle,
        received: Log,
    }

    fn fixture(refresh_enabled: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(SettingsRegistry::load_dir(dir.path()));
        let session = Arc::new(LocalSession::with_tenants(vec![
            Tenant {
                id: 42,
                name: "Guild".into(),
            },
            Tenant {
                id: 43,
                name: "Other".into(),
            },
        ]));
        let lifecycle = CommandLifecycle::new(refresh_enabled);
        let received: Log = Arc::default();
        let plugin = Pinger {
            received: Arc::clone(&received),
        };

        let mut registry = ComponentRegistry::new();
        registry.insert(PluginSlot::loaded(
            PluginDescriptor::from_manifest("pinger", &plugin.manifest()),
            PluginContext::new("pinger", settings, session.clone())
                .with_listeners(Arc::clone(lifecycle.listeners())),
            LoadedPlugin::new(Box::new(plugin), None),
        ));

        Fixture {
            _dir: dir,
            session,
            dispatcher: Dispatcher::new(Arc::new(registry)),
            lifecycle,
            received,
        }
    }

    impl Fixture {
        async fn ready(&self) {
            self.lifecycle
                .on_ready(self.session.as_ref(), &self.dispatcher)
                .await;
        }

        async fn route(&self, interaction: Interaction) -> InteractionOutcome {
            self.lifecycle
                .route_interaction(interaction, self.session.as_ref(), &self.dispatcher)
                .await
        }

        fn log(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }
    }

    fn command_interaction(
        id: u64,
        command: &RegisteredCommand,
        options: &[&str],
    ) -> Interaction {
        Interaction {
            id,
            tenant_id: Some(42),
            channel_id: None,
            user: User {
                id: 7,
                name: "ada".into(),
                bot: false,
            },
            kind: InteractionKind::Command(CommandInvocation {
                command_id: command.id,
                name: command.name.clone(),
                options: options
                    .iter()
                    .map(|name| (name.to_string(), json!(true)))
                    .collect::<BTreeMap<_, _>>(),
            }),
        }
    }

    #[tokio::test]
    async fn test_first_ready_creates_commands_once() {
        let f = fixture(true);

        let report = f
            .lifecycle
            .on_ready(f.session.as_ref(), &f.dispatcher)
            .await;
        assert!(report.is_some_and(|r| r.failed.is_empty()));
        assert!(f.lifecycle.commands_created());
        assert_eq!(f.session.commands_named(REFRESH_COMMAND_NAME).len(), 1);
        assert_eq!(f.session.commands_named("ping").len(), 1);
        assert_eq!(f.lifecycle.listeners().len(), 4);
        let creations = f.session.creation_count();

        // Reconnect
        assert!(
            f.lifecycle
                .on_ready(f.session.as_ref(), &f.dispatcher)
                .await
                .is_none()
        );
        assert_eq!(f.session.creation_count(), creations);
        assert_eq!(f.lifecycle.listeners().len(), 4);
    }

    #[tokio::test]
    async fn test_refresh_command_can_be_disabled() {
        let f = fixture(false);
        f.ready().await;

        assert!(f.lifecycle.refresh_command().is_none());
        assert!(f.session.commands_named(REFRESH_COMMAND_NAME).is_empty());
        assert_eq!(f.session.commands_named("ping").len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_recreates_everything_but_itself() {
        let f = fixture(true);
        f.ready().await;
        let refresh = f.lifecycle.refresh_command().unwrap();
        let old_local = f.session.commands_named("local")[0].clone();

        let outcome = f.route(command_interaction(99, &refresh, &[])).await;

        let InteractionOutcome::Refresh(report) = outcome else {
            panic!("expected a refresh");
        };
        assert!(report.listed_everything());
        assert_eq!(report.deleted_global, 1);
        assert_eq!(report.deleted_tenant, 2);
        assert_eq!(report.failed_deletes, 0);
        assert!(report.recreated.failed.is_empty());

        // Refresh command untouched, plugin commands recreated with new ids
        assert_eq!(f.session.commands_named(REFRESH_COMMAND_NAME), vec![refresh]);
        assert_eq!(f.session.commands_named("ping").len(), 1);
        assert!(
            f.session
                .commands_named("local")
                .iter()
                .all(|local| local.id != old_local.id)
        );
        assert_eq!(f.session.responses(), vec![(99, REFRESH_DONE.to_string())]);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let f = fixture(true);
        f.ready().await;

        f.lifecycle.refresh(f.session.as_ref(), &f.dispatcher).await;
        let names = |s: &LocalSession| {
            let mut names: Vec<_> = s.commands().into_iter().map(|c| c.registered.name).collect();
            names.sort();
            names
        };
        let after_first = names(&f.session);
        f.lifecycle.refresh(f.session.as_ref(), &f.dispatcher).await;
        assert_eq!(names(&f.session), after_first);
        assert_eq!(after_first, vec!["local", "local", "ping", REFRESH_COMMAND_NAME]);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_refresh() {
        let f = fixture(true);
        f.ready().await;
        let ping = f.session.commands_named("ping")[0].clone();
        f.session.fail_delete(ping.id);

        let report = f.lifecycle.refresh(f.session.as_ref(), &f.dispatcher).await;
        assert_eq!(report.failed_deletes, 1);
        assert_eq!(report.deleted_global, 0);
        assert_eq!(report.deleted_tenant, 2);
        assert!(report.listed_everything());
    }

    #[tokio::test]
    async fn test_tenant_listing_failure_still_recreates_commands() {
        let f = fixture(true);
        f.ready().await;
        let refresh = f.lifecycle.refresh_command().unwrap();
        f.session.fail_tenant_listing(42);

        let outcome = f.route(command_interaction(5, &refresh, &[])).await;

        let InteractionOutcome::Refresh(report) = outcome else {
            panic!("expected a refresh");
        };
        assert_eq!(report.failed_listings, 1);
        assert_eq!(report.deleted_global, 1);
        // The other tenant is still cleared
        assert_eq!(report.deleted_tenant, 1);
        assert!(report.recreated.failed.is_empty());

        assert_eq!(f.session.commands_named("ping").len(), 1);
        assert_eq!(f.lifecycle.listeners().len(), 4);
        assert_eq!(f.session.responses(), vec![(5, REFRESH_FAILED.to_string())]);
    }

    #[tokio::test]
    async fn test_global_listing_failure_still_recreates_commands() {
        let f = fixture(true);
        f.ready().await;
        f.session.fail_listing(true);

        let report = f.lifecycle.refresh(f.session.as_ref(), &f.dispatcher).await;

        // Global and both tenants
        assert_eq!(report.failed_listings, 3);
        assert_eq!(report.deleted_global + report.deleted_tenant, 0);
        assert!(report.recreated.failed.is_empty());
        assert_eq!(f.session.commands_named("ping").len(), 1);
    }

    #[tokio::test]
    async fn test_plugin_command_is_routed() {
        let f = fixture(true);
        f.ready().await;
        let ping = f.session.commands_named("ping")[0].clone();

        let outcome = f.route(command_interaction(1, &ping, &[])).await;

        let InteractionOutcome::Command { listeners, received } = outcome else {
            panic!("expected a plugin command");
        };
        assert_eq!(listeners.invoked, 0);
        assert_eq!(received.invoked, 1);
        assert_eq!(f.log(), vec!["received:ping"]);
        assert!(f.session.responses().is_empty());
    }

    #[tokio::test]
    async fn test_listeners_run_before_command_received() {
        let f = fixture(true);
        f.ready().await;
        let local = f.session.commands_named("local")[0].clone();

        f.route(command_interaction(1, &local, &[])).await;
        assert_eq!(f.log(), vec!["listener:local", "received:local"]);
    }

    #[tokio::test]
    async fn test_option_listener_needs_its_option() {
        let f = fixture(true);
        f.ready().await;
        let local = f.session.commands_named("local")[0].clone();

        let outcome = f.route(command_interaction(1, &local, &["loud"])).await;
        let InteractionOutcome::Command { listeners, .. } = outcome else {
            panic!("expected a plugin command");
        };
        assert_eq!(listeners.invoked, 2);
        assert_eq!(
            f.log(),
            vec!["listener:local", "listener:loud", "received:local"]
        );
    }

    #[tokio::test]
    async fn test_refresh_drops_stale_listeners() {
        let f = fixture(true);
        f.ready().await;
        let old_local = f.session.commands_named("local")[0].clone();
        f.lifecycle.refresh(f.session.as_ref(), &f.dispatcher).await;
        assert_eq!(f.lifecycle.listeners().len(), 4);

        f.route(command_interaction(1, &old_local, &["loud"])).await;
        assert_eq!(f.log(), vec!["received:local"]);

        let new_local = f.session.commands_named("local")[0].clone();
        f.received.lock().unwrap().clear();
        f.route(command_interaction(2, &new_local, &[])).await;
        assert_eq!(f.log(), vec!["listener:local", "received:local"]);
    }

    #[tokio::test]
    async fn test_non_command_interaction() {
        let f = fixture(true);
        let interaction = Interaction {
            kind: InteractionKind::Component {
                custom_id: "btn".into(),
            },
            ..command_interaction(
                1,
                &RegisteredCommand {
                    id: CommandId(0),
                    name: "x".into(),
                    scope: adapt_plugin_api::CommandScope::Global,
                    options: Vec::new(),
                },
                &[],
            )
        };

        let outcome = f.route(interaction).await;
        assert!(matches!(outcome, InteractionOutcome::Interaction));
        assert!(f.log().is_empty());
    }
}
