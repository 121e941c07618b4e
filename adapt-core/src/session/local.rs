//! In-memory session for local runs and tests
//!
//! LocalSession keeps commands, tenants and responses in memory and
//! delivers whatever events are pushed into it with [`LocalSession::emit`].
//! Failures can be injected to exercise the host's error paths.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use adapt_plugin_api::{
    Activity, CommandClient, CommandId, CommandScope, CommandSpec, PluginError,
    RegisteredCommand, SessionHandle, Snowflake, Tenant, TenantId,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::SessionError;
use super::events::GatewayEvent;
use super::traits::Session;

/// First id handed out for created commands
const FIRST_COMMAND_ID: u64 = 1000;

/// A command as stored by the local session
#[derive(Debug, Clone)]
pub struct StoredCommand {
    pub registered: RegisteredCommand,
    pub spec: CommandSpec,
}

#[derive(Default)]
struct Failures {
    start: Option<String>,
    listing: bool,
    tenant_listings: BTreeSet<TenantId>,
    deletes: BTreeSet<CommandId>,
}

/// In-memory implementation of [`Session`]
pub struct LocalSession {
    started: AtomicBool,
    sender: Mutex<Option<mpsc::UnboundedSender<GatewayEvent>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<GatewayEvent>>>,
    tenants: Mutex<Vec<Tenant>>,
    commands: Mutex<Vec<StoredCommand>>,
    next_command_id: AtomicU64,
    creations: AtomicU64,
    activity: Mutex<Option<Activity>>,
    responses: Mutex<Vec<(Snowflake, String)>>,
    failures: Mutex<Failures>,
}

impl LocalSession {
    /// Create a session with no tenants
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            started: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            tenants: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            next_command_id: AtomicU64::new(FIRST_COMMAND_ID),
            creations: AtomicU64::new(0),
            activity: Mutex::new(None),
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
        }
    }

    /// Create a session that is already a member of `tenants`
    pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
        let session = Self::new();
        *lock(&session.tenants) = tenants;
        session
    }

    /// Deliver an event to the host.
    ///
    /// Tenant membership events also update the tenant list, the way a
    /// gateway cache would. Returns `false` once the session is closed.
    pub fn emit(&self, event: GatewayEvent) -> bool {
        match &event {
            GatewayEvent::TenantJoined(tenant) => {
                let mut tenants = lock(&self.tenants);
                if !tenants.iter().any(|t| t.id == tenant.id) {
                    tenants.push(tenant.clone());
                }
            }
            GatewayEvent::TenantLeft(tenant) => {
                lock(&self.tenants).retain(|t| t.id != tenant.id);
            }
            _ => {}
        }

        match lock(&self.sender).as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver every event in order
    pub fn emit_all(&self, events: impl IntoIterator<Item = GatewayEvent>) -> usize {
        events.into_iter().map(|e| self.emit(e)).filter(|sent| *sent).count()
    }

    /// End the event stream; the host's event loop finishes once drained
    pub fn close(&self) {
        lock(&self.sender).take();
    }

    /// Whether `start` succeeded
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Commands currently registered
    pub fn commands(&self) -> Vec<StoredCommand> {
        lock(&self.commands).clone()
    }

    /// Registered commands with the given name
    pub fn commands_named(&self, name: &str) -> Vec<RegisteredCommand> {
        lock(&self.commands)
            .iter()
            .filter(|c| c.registered.name == name)
            .map(|c| c.registered.clone())
            .collect()
    }

    /// Total number of create calls that succeeded
    pub fn creation_count(&self) -> u64 {
        self.creations.load(Ordering::SeqCst)
    }

    /// Last activity set through the session
    pub fn activity(&self) -> Option<Activity> {
        lock(&self.activity).clone()
    }

    /// Interaction responses, in the order they were sent
    pub fn responses(&self) -> Vec<(Snowflake, String)> {
        lock(&self.responses).clone()
    }

    // ─── Failure injection ───────────────────────────────────────────

    /// Make `start` fail with `message`
    pub fn fail_start(&self, message: impl Into<String>) {
        lock(&self.failures).start = Some(message.into());
    }

    /// Make command listing fail
    pub fn fail_listing(&self, fail: bool) {
        lock(&self.failures).listing = fail;
    }

    /// Make listing the commands of one tenant fail
    pub fn fail_tenant_listing(&self, tenant: TenantId) {
        lock(&self.failures).tenant_listings.insert(tenant);
    }

    /// Make deleting the given command fail
    pub fn fail_delete(&self, id: CommandId) {
        lock(&self.failures).deletes.insert(id);
    }

    fn create(&self, scope: CommandScope, spec: CommandSpec) -> Result<RegisteredCommand, PluginError> {
        spec.validate()?;
        let mut commands = lock(&self.commands);

        // Creating an existing name in the same scope overwrites it
        if let Some(existing) = commands
            .iter_mut()
            .find(|c| c.registered.scope == scope && c.registered.name == spec.name)
        {
            existing.registered = RegisteredCommand::from_spec(existing.registered.id, scope, &spec);
            existing.spec = spec;
            self.creations.fetch_add(1, Ordering::SeqCst);
            return Ok(existing.registered.clone());
        }

        let id = CommandId(self.next_command_id.fetch_add(1, Ordering::SeqCst));
        let registered = RegisteredCommand::from_spec(id, scope, &spec);
        debug!(command = %registered.name, id = %registered.id, "Created command");
        commands.push(StoredCommand {
            registered: registered.clone(),
            spec,
        });
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(registered)
    }

    fn list(&self, scope: CommandScope) -> Result<Vec<RegisteredCommand>, PluginError> {
        let failures = lock(&self.failures);
        if failures.listing {
            return Err(PluginError::session("listing commands is unavailable"));
        }
        if let CommandScope::Tenant(tenant) = scope {
            if failures.tenant_listings.contains(&tenant) {
                return Err(PluginError::session(format!(
                    "listing commands of tenant {tenant} is unavailable"
                )));
            }
        }
        drop(failures);
        Ok(lock(&self.commands)
            .iter()
            .filter(|c| c.registered.scope == scope)
            .map(|c| c.registered.clone())
            .collect())
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CommandClient for LocalSession {
    async fn create_global_command(
        &self,
        spec: CommandSpec,
    ) -> Result<RegisteredCommand, PluginError> {
        self.create(CommandScope::Global, spec)
    }

    async fn create_tenant_command(
        &self,
        tenant: TenantId,
        spec: CommandSpec,
    ) -> Result<RegisteredCommand, PluginError> {
        if !lock(&self.tenants).iter().any(|t| t.id == tenant) {
            return Err(PluginError::session(format!("unknown tenant {tenant}")));
        }
        self.create(CommandScope::Tenant(tenant), spec)
    }

    async fn global_commands(&self) -> Result<Vec<RegisteredCommand>, PluginError> {
        self.list(CommandScope::Global)
    }

    async fn tenant_commands(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<RegisteredCommand>, PluginError> {
        self.list(CommandScope::Tenant(tenant))
    }

    async fn delete_command(&self, command: &RegisteredCommand) -> Result<(), PluginError> {
        if lock(&self.failures).deletes.contains(&command.id) {
            return Err(PluginError::session(format!(
                "failed to delete command {}",
                command.id
            )));
        }
        let mut commands = lock(&self.commands);
        let before = commands.len();
        commands.retain(|c| c.registered.id != command.id);
        if commands.len() == before {
            return Err(PluginError::UnknownCommand(command.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionHandle for LocalSession {
    fn tenants(&self) -> Vec<Tenant> {
        lock(&self.tenants).clone()
    }

    async fn set_activity(&self, activity: Activity) -> Result<(), PluginError> {
        *lock(&self.activity) = Some(activity);
        Ok(())
    }

    async fn respond(&self, interaction_id: Snowflake, content: &str) -> Result<(), PluginError> {
        lock(&self.responses).push((interaction_id, content.to_string()));
        Ok(())
    }

    fn command_client(&self) -> &dyn CommandClient {
        self
    }
}

#[async_trait]
impl Session for LocalSession {
    async fn start(&self, _token: &str) -> Result<(), SessionError> {
        if let Some(message) = lock(&self.failures).start.clone() {
            return Err(SessionError::Start(message));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyStarted);
        }
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<GatewayEvent>> {
        lock(&self.receiver).take()
    }

    fn as_handle(self: Arc<Self>) -> Arc<dyn SessionHandle> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> Tenant {
        Tenant {
            id: 42,
            name: "Guild".into(),
        }
    }

    #[tokio::test]
    async fn test_start_once() {
        let session = LocalSession::new();
        session.start("token").await.unwrap();
        assert!(session.is_started());
        assert!(matches!(
            session.start("token").await,
            Err(SessionError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_injected_start_failure() {
        let session = LocalSession::new();
        session.fail_start("bad token");
        let err = session.start("token").await.unwrap_err();
        assert!(err.to_string().contains("bad token"));
        assert!(!session.is_started());
    }

    #[test]
    fn test_events_taken_once() {
        let session = LocalSession::new();
        assert!(session.take_events().is_some());
        assert!(session.take_events().is_none());
    }

    #[tokio::test]
    async fn test_emit_and_close() {
        let session = LocalSession::new();
        let mut rx = session.take_events().unwrap();
        assert!(session.emit(GatewayEvent::Ready));
        session.close();
        assert!(!session.emit(GatewayEvent::Ready));

        assert_eq!(rx.recv().await, Some(GatewayEvent::Ready));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_tenant_events_update_membership() {
        let session = LocalSession::new();
        session.emit(GatewayEvent::TenantJoined(guild()));
        session.emit(GatewayEvent::TenantJoined(guild()));
        assert_eq!(session.tenants().len(), 1);

        session.emit(GatewayEvent::TenantLeft(guild()));
        assert!(session.tenants().is_empty());
    }

    #[tokio::test]
    async fn test_create_list_delete_commands() {
        let session = LocalSession::with_tenants(vec![guild()]);
        let global = session
            .create_global_command(CommandSpec::new("ping", "Ping"))
            .await
            .unwrap();
        let local = session
            .create_tenant_command(42, CommandSpec::new("pong", "Pong"))
            .await
            .unwrap();
        assert_ne!(global.id, local.id);
        assert_eq!(local.scope, CommandScope::Tenant(42));

        assert_eq!(session.global_commands().await.unwrap(), vec![global.clone()]);
        assert_eq!(session.tenant_commands(42).await.unwrap(), vec![local]);

        session.delete_command(&global).await.unwrap();
        assert!(session.global_commands().await.unwrap().is_empty());
        assert!(matches!(
            session.delete_command(&global).await,
            Err(PluginError::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_create_same_name_overwrites() {
        let session = LocalSession::new();
        let first = session
            .create_global_command(CommandSpec::new("ping", "Ping"))
            .await
            .unwrap();
        let second = session
            .create_global_command(CommandSpec::new("ping", "Ping again"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(session.commands().len(), 1);
        assert_eq!(session.commands()[0].spec.description, "Ping again");
        assert_eq!(session.creation_count(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_spec_and_unknown_tenant() {
        let session = LocalSession::new();
        assert!(
            session
                .create_global_command(CommandSpec::new("Bad Name", "x"))
                .await
                .is_err()
        );
        assert!(
            session
                .create_tenant_command(7, CommandSpec::new("ok", "x"))
                .await
                .is_err()
        );
        assert!(session.commands().is_empty());
    }

    #[tokio::test]
    async fn test_injected_listing_and_delete_failures() {
        let session = LocalSession::new();
        let command = session
            .create_global_command(CommandSpec::new("ping", "Ping"))
            .await
            .unwrap();

        session.fail_delete(command.id);
        assert!(session.delete_command(&command).await.is_err());

        session.fail_tenant_listing(7);
        assert!(session.tenant_commands(7).await.is_err());
        assert!(session.tenant_commands(8).await.is_ok());
        assert!(session.global_commands().await.is_ok());

        session.fail_listing(true);
        assert!(session.global_commands().await.is_err());
    }

    #[tokio::test]
    async fn test_records_activity_and_responses() {
        let session = LocalSession::new();
        session
            .set_activity(Activity {
                text: "Online".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        session.respond(5, "done").await.unwrap();

        assert_eq!(session.activity().unwrap().text, "Online");
        assert_eq!(session.responses(), vec![(5, "done".to_string())]);
    }
}
