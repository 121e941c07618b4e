//! Event dispatcher - fans one hook out to every loaded plugin

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use adapt_plugin_api::{
    Channel, CommandCall, CommandInvocation, CommandListener, HookResult, Interaction, LogRecord,
    Member, Message, MessageRef, Plugin, PluginContext, Reaction, Tenant, User, VoiceState,
};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::error::PluginHostError;
use super::registry::{ComponentRegistry, PluginSlot, SharedPlugin};
use crate::session::GatewayEvent;

/// Which plugin hook to invoke, with its arguments
#[derive(Debug, Clone)]
pub enum Hook {
    CreateCommands,
    Ready,
    Log(LogRecord),
    MessageReceived(Message),
    MessageDeleted(MessageRef),
    UserJoined(Member),
    UserLeft { tenant: Tenant, user: User },
    ChannelCreated(Channel),
    ChannelDestroyed(Channel),
    ChannelUpdated { before: Channel, after: Channel },
    VoiceStateUpdated { user: User, before: VoiceState, after: VoiceState },
    ReactionAdded(Reaction),
    ReactionRemoved(Reaction),
    ReactionsCleared(MessageRef),
    UserUpdated { before: User, after: User },
    MemberUpdated { before: Option<Member>, after: Member },
    TenantJoined(Tenant),
    TenantLeft(Tenant),
    InteractionCreated(Interaction),
    CommandReceived {
        interaction: Interaction,
        invocation: CommandInvocation,
    },
}

impl Hook {
    /// Name of the plugin method this hook calls
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCommands => "create_commands",
            Self::Ready => "on_ready",
            Self::Log(_) => "on_log",
            Self::MessageReceived(_) => "on_message_received",
            Self::MessageDeleted(_) => "on_message_deleted",
            Self::UserJoined(_) => "on_user_joined",
            Self::UserLeft { .. } => "on_user_left",
            Self::ChannelCreated(_) => "on_channel_created",
            Self::ChannelDestroyed(_) => "on_channel_destroyed",
            Self::ChannelUpdated { .. } => "on_channel_updated",
            Self::VoiceStateUpdated { .. } => "on_voice_state_updated",
            Self::ReactionAdded(_) => "on_reaction_added",
            Self::ReactionRemoved(_) => "on_reaction_removed",
            Self::ReactionsCleared(_) => "on_reactions_cleared",
            Self::UserUpdated { .. } => "on_user_updated",
            Self::MemberUpdated { .. } => "on_member_updated",
            Self::TenantJoined(_) => "on_tenant_joined",
            Self::TenantLeft(_) => "on_tenant_left",
            Self::InteractionCreated(_) => "on_interaction_created",
            Self::CommandReceived { .. } => "on_command_received",
        }
    }
}

impl From<GatewayEvent> for Hook {
    fn from(event: GatewayEvent) -> Self {
        match event {
            GatewayEvent::Ready => Self::Ready,
            GatewayEvent::Log(record) => Self::Log(record),
            GatewayEvent::MessageReceived(message) => Self::MessageReceived(message),
            GatewayEvent::MessageDeleted(message) => Self::MessageDeleted(message),
            GatewayEvent::UserJoined(member) => Self::UserJoined(member),
            GatewayEvent::UserLeft { tenant, user } => Self::UserLeft { tenant, user },
            GatewayEvent::ChannelCreated(channel) => Self::ChannelCreated(channel),
            GatewayEvent::ChannelDestroyed(channel) => Self::ChannelDestroyed(channel),
            GatewayEvent::ChannelUpdated { before, after } => Self::ChannelUpdated { before, after },
            GatewayEvent::VoiceStateUpdated {
                user,
                before,
                after,
            } => Self::VoiceStateUpdated {
                user,
                before,
                after,
            },
            GatewayEvent::ReactionAdded(reaction) => Self::ReactionAdded(reaction),
            GatewayEvent::ReactionRemoved(reaction) => Self::ReactionRemoved(reaction),
            GatewayEvent::ReactionsCleared(message) => Self::ReactionsCleared(message),
            GatewayEvent::UserUpdated { before, after } => Self::UserUpdated { before, after },
            GatewayEvent::MemberUpdated { before, after } => Self::MemberUpdated { before, after },
            GatewayEvent::TenantJoined(tenant) => Self::TenantJoined(tenant),
            GatewayEvent::TenantLeft(tenant) => Self::TenantLeft(tenant),
            GatewayEvent::InteractionCreated(interaction) => Self::InteractionCreated(interaction),
        }
    }
}

/// Name reported for command listener runs
pub const LISTENER_HOOK: &str = "command_listener";

/// How a dispatch cycle relates to its caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Await every plugin, in order, before returning
    #[default]
    Sequential,
    /// Run the ordered loop on its own task and return immediately
    Detached,
}

/// One plugin's failure during a dispatch cycle
#[derive(Debug)]
pub struct DispatchFailure {
    pub key: String,
    pub name: String,
    pub error: PluginHostError,
}

/// Outcome of a dispatch cycle
#[derive(Debug)]
pub struct DispatchReport {
    /// Hook that was dispatched
    pub hook: &'static str,
    /// Plugins the hook was invoked on (present instances only)
    pub invoked: usize,
    /// Plugins whose hook failed
    pub failed: Vec<DispatchFailure>,
    /// The cycle was detached; `invoked` and `failed` are not known yet
    pub detached: bool,
}

impl DispatchReport {
    fn detached(hook: &'static str) -> Self {
        Self {
            hook,
            invoked: 0,
            failed: Vec::new(),
            detached: true,
        }
    }

    /// Number of plugins whose hook completed
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failed.len()
    }

    /// Whether a plugin with the given key failed
    pub fn failed_key(&self, key: &str) -> bool {
        self.failed.iter().any(|failure| failure.key == key)
    }
}

/// Invokes hooks on every present plugin with per-plugin isolation.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ComponentRegistry>,
    strategy: DispatchStrategy,
    hook_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            strategy: DispatchStrategy::default(),
            hook_timeout: None,
        }
    }

    /// Builder: set the dispatch strategy
    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder: fail hooks that run longer than `timeout`
    pub fn with_hook_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Invoke `hook` on every present plugin using the configured strategy
    pub async fn invoke_all(&self, hook: Hook) -> DispatchReport {
        match self.strategy {
            DispatchStrategy::Sequential => self.invoke_ordered(hook).await,
            DispatchStrategy::Detached => {
                let name = hook.name();
                drop(self.spawn_all(hook));
                DispatchReport::detached(name)
            }
        }
    }

    /// Run the ordered loop on a new task
    pub fn spawn_all(&self, hook: Hook) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.invoke_ordered(hook).await })
    }

    /// Invoke `hook` on every present plugin in registry order and wait for
    /// all of them, whatever the strategy
    pub async fn invoke_ordered(&self, hook: Hook) -> DispatchReport {
        let mut report = DispatchReport {
            hook: hook.name(),
            invoked: 0,
            failed: Vec::new(),
            detached: false,
        };

        for (slot, plugin) in self.registry.present() {
            report.invoked += 1;
            if let Err(error) = invoke_one(slot, plugin, &hook, self.hook_timeout).await {
                tracing::error!(
                    plugin = %slot.descriptor.key,
                    name = %slot.descriptor.name,
                    hook = hook.name(),
                    error = %error,
                    "Plugin hook failed"
                );
                report.failed.push(DispatchFailure {
                    key: slot.descriptor.key.clone(),
                    name: slot.descriptor.name.clone(),
                    error,
                });
            }
        }

        tracing::trace!(
            hook = report.hook,
            invoked = report.invoked,
            failed = report.failed.len(),
            "Dispatch complete"
        );
        report
    }

    /// Run command listeners using the configured strategy
    pub async fn invoke_listeners(
        &self,
        listeners: Vec<CommandListener>,
        interaction: Interaction,
        invocation: CommandInvocation,
    ) -> DispatchReport {
        match self.strategy {
            DispatchStrategy::Sequential => {
                self.listeners_ordered(listeners, interaction, invocation)
                    .await
            }
            DispatchStrategy::Detached => {
                let dispatcher = self.clone();
                drop(tokio::spawn(async move {
                    dispatcher
                        .listeners_ordered(listeners, interaction, invocation)
                        .await
                }));
                DispatchReport::detached(LISTENER_HOOK)
            }
        }
    }

    /// Run command listeners in order and wait for all of them.
    ///
    /// Listeners of plugins that are absent from the registry are skipped.
    /// Plugin instances are not locked; handlers own whatever state they use.
    pub async fn listeners_ordered(
        &self,
        listeners: Vec<CommandListener>,
        interaction: Interaction,
        invocation: CommandInvocation,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            hook: LISTENER_HOOK,
            invoked: 0,
            failed: Vec::new(),
            detached: false,
        };

        for listener in listeners {
            let Some(slot) = self
                .registry
                .get(listener.plugin_key())
                .filter(|slot| slot.is_present())
            else {
                tracing::debug!(
                    plugin = listener.plugin_key(),
                    "Skipping listener of an absent plugin"
                );
                continue;
            };

            report.invoked += 1;
            let call = listener.call(CommandCall {
                interaction: interaction.clone(),
                invocation: invocation.clone(),
                ctx: slot.context.clone(),
            });
            let outcome = guarded(call, &slot.descriptor.name, LISTENER_HOOK, self.hook_timeout);
            if let Err(error) = outcome.await {
                tracing::error!(
                    plugin = %slot.descriptor.key,
                    name = %slot.descriptor.name,
                    command = %invocation.name,
                    error = %error,
                    "Command listener failed"
                );
                report.failed.push(DispatchFailure {
                    key: slot.descriptor.key.clone(),
                    name: slot.descriptor.name.clone(),
                    error,
                });
            }
        }
        report
    }
}

async fn invoke_one(
    slot: &PluginSlot,
    plugin: &SharedPlugin,
    hook: &Hook,
    hook_timeout: Option<Duration>,
) -> Result<(), PluginHostError> {
    let mut guard = plugin.lock().await;
    let call = call_hook(guard.instance_mut(), hook, &slot.context);
    guarded(call, &slot.descriptor.name, hook.name(), hook_timeout).await
}

/// Await a plugin future, turning errors, panics and overruns into failures
async fn guarded(
    call: impl Future<Output = HookResult>,
    name: &str,
    hook: &'static str,
    hook_timeout: Option<Duration>,
) -> Result<(), PluginHostError> {
    let call = AssertUnwindSafe(call).catch_unwind();
    let outcome = match hook_timeout {
        Some(timeout) => tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| PluginHostError::Timeout {
                name: name.to_string(),
                timeout,
            })?,
        None => call.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(PluginHostError::HookFailed {
            name: name.to_string(),
            hook,
            source,
        }),
        Err(_) => Err(PluginHostError::Panicked {
            name: name.to_string(),
            hook,
        }),
    }
}

async fn call_hook(plugin: &mut dyn Plugin, hook: &Hook, ctx: &PluginContext) -> HookResult {
    match hook {
        Hook::CreateCommands => {
            plugin
                .create_commands(ctx.session().command_client(), ctx)
                .await
        }
        Hook::Ready => plugin.on_ready(ctx).await,
        Hook::Log(record) => plugin.on_log(record, ctx).await,
        Hook::MessageReceived(message) => plugin.on_message_received(message, ctx).await,
        Hook::MessageDeleted(message) => plugin.on_message_deleted(message, ctx).await,
        Hook::UserJoined(member) => plugin.on_user_joined(member, ctx).await,
        Hook::UserLeft { tenant, user } => plugin.on_user_left(tenant, user, ctx).await,
        Hook::ChannelCreated(channel) => plugin.on_channel_created(channel, ctx).await,
        Hook::ChannelDestroyed(channel) => plugin.on_channel_destroyed(channel, ctx).await,
        Hook::ChannelUpdated { before, after } => {
            plugin.on_channel_updated(before, after, ctx).await
        }
        Hook::VoiceStateUpdated {
            user,
            before,
            after,
        } => plugin.on_voice_state_updated(user, before, after, ctx).await,
        Hook::ReactionAdded(reaction) => plugin.on_reaction_added(reaction, ctx).await,
        Hook::ReactionRemoved(reaction) => plugin.on_reaction_removed(reaction, ctx).await,
        Hook::ReactionsCleared(message) => plugin.on_reactions_cleared(message, ctx).await,
        Hook::UserUpdated { before, after } => plugin.on_user_updated(before, after, ctx).await,
        Hook::MemberUpdated { before, after } => {
            plugin.on_member_updated(before.as_ref(), after, ctx).await
        }
        Hook::TenantJoined(tenant) => plugin.on_tenant_joined(tenant, ctx).await,
        Hook::TenantLeft(tenant) => plugin.on_tenant_left(tenant, ctx).await,
        Hook::InteractionCreated(interaction) => {
            plugin.on_interaction_created(interaction, ctx).await
        }
        Hook::CommandReceived {
            interaction,
            invocation,
        } => plugin.on_command_received(interaction, invocation, ctx).await,
    }
}
