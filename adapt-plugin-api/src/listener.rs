//! Per-command listeners
//!
//! Instead of matching ids in
//! [`Plugin::on_command_received`](crate::Plugin::on_command_received), a
//! plugin can attach handlers to the commands it creates:
//!
//! ```ignore
//! let test = commands.create_tenant_command(tenant, spec).await?;
//! ctx.listen(&test, |call: CommandCall| async move {
//!     call.ctx.session().respond(call.interaction.id, "Beep boop!").await
//! });
//! ```
//!
//! Listeners are dropped when commands are refreshed; plugins attach them
//! again from `create_commands`.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use crate::HookResult;
use crate::command::CommandId;
use crate::context::PluginContext;
use crate::types::{CommandInvocation, Interaction};

/// Future returned by a command handler
pub type CommandFuture = Pin<Box<dyn Future<Output = HookResult> + Send>>;

/// Async handler attached to one command
pub type CommandHandler = Arc<dyn Fn(CommandCall) -> CommandFuture + Send + Sync>;

/// One invocation handed to a listener
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub interaction: Interaction,
    pub invocation: CommandInvocation,
    /// Context of the plugin that attached the listener
    pub ctx: PluginContext,
}

/// A handler attached to a command, optionally narrowed to option names
#[derive(Clone)]
pub struct CommandListener {
    plugin_key: String,
    options: BTreeSet<String>,
    handler: CommandHandler,
}

impl CommandListener {
    pub(crate) fn new(
        plugin_key: impl Into<String>,
        options: BTreeSet<String>,
        handler: CommandHandler,
    ) -> Self {
        Self {
            plugin_key: plugin_key.into(),
            options,
            handler,
        }
    }

    /// Key of the plugin that attached this listener
    pub fn plugin_key(&self) -> &str {
        &self.plugin_key
    }

    /// Option names that must all be present; empty matches every invocation
    pub fn options(&self) -> &BTreeSet<String> {
        &self.options
    }

    /// Whether the invocation carries every option this listener waits for
    pub fn matches(&self, invocation: &CommandInvocation) -> bool {
        self.options
            .iter()
            .all(|name| invocation.options.contains_key(name))
    }

    /// Start the handler
    pub fn call(&self, call: CommandCall) -> CommandFuture {
        (self.handler)(call)
    }
}

impl std::fmt::Debug for CommandListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandListener")
            .field("plugin_key", &self.plugin_key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Listeners of every command, shared by the host and all plugin contexts
#[derive(Debug, Default)]
pub struct CommandListeners {
    by_command: RwLock<HashMap<CommandId, Vec<CommandListener>>>,
}

impl CommandListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, command: CommandId, listener: CommandListener) {
        self.by_command
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(command)
            .or_default()
            .push(listener);
    }

    /// Listeners to run for an invocation.
    ///
    /// Plain listeners come first, then option listeners whose options are
    /// all present, each group in the order they were attached.
    pub fn matching(&self, invocation: &CommandInvocation) -> Vec<CommandListener> {
        let by_command = self
            .by_command
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = by_command.get(&invocation.command_id) else {
            return Vec::new();
        };

        let (plain, narrowed): (Vec<_>, Vec<_>) = listeners
            .iter()
            .filter(|listener| listener.matches(invocation))
            .cloned()
            .partition(|listener| listener.options.is_empty());
        plain.into_iter().chain(narrowed).collect()
    }

    /// Total number of attached listeners
    pub fn len(&self) -> usize {
        self.by_command
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.by_command
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn listener(options: &[&str]) -> CommandListener {
        let handler: CommandHandler =
            Arc::new(|_call: CommandCall| -> CommandFuture { Box::pin(async { Ok(()) }) });
        CommandListener::new(
            "test",
            options.iter().map(|o| o.to_string()).collect(),
            handler,
        )
    }

    fn invocation(command_id: u64, options: &[&str]) -> CommandInvocation {
        CommandInvocation {
            command_id: CommandId(command_id),
            name: "test".into(),
            options: options
                .iter()
                .map(|name| (name.to_string(), json!(true)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_listener_matches_option_subset() {
        assert!(listener(&[]).matches(&invocation(1, &[])));
        assert!(listener(&["option"]).matches(&invocation(1, &["option", "other"])));
        assert!(!listener(&["option"]).matches(&invocation(1, &["other"])));
        assert!(!listener(&["option", "other"]).matches(&invocation(1, &["option"])));
    }

    #[test]
    fn test_matching_puts_plain_listeners_first() {
        let listeners = CommandListeners::new();
        listeners.add(CommandId(1), listener(&["option"]));
        listeners.add(CommandId(1), listener(&[]));
        listeners.add(CommandId(1), listener(&["missing"]));
        listeners.add(CommandId(2), listener(&[]));

        let matched = listeners.matching(&invocation(1, &["option"]));
        let options: Vec<usize> = matched.iter().map(|l| l.options().len()).collect();
        assert_eq!(options, vec![0, 1]);
        assert_eq!(listeners.len(), 4);

        assert!(listeners.matching(&invocation(3, &[])).is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let listeners = CommandListeners::new();
        listeners.add(CommandId(1), listener(&[]));
        listeners.clear();
        assert!(listeners.is_empty());
        assert!(listeners.matching(&invocation(1, &[])).is_empty());
    }
}
