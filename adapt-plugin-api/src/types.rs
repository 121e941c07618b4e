//! Plugin metadata and the payload types carried by gateway events

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::CommandId;

/// Platform object identifier
pub type Snowflake = u64;

/// Identifier of a tenant (one chat server)
pub type TenantId = Snowflake;

/// Plugin manifest containing metadata about the plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Human-readable plugin name
    pub name: String,
    /// Plugin version (semver)
    pub version: String,
    /// API version this plugin was built against
    pub api_version: u32,
    /// Human-readable description
    pub description: String,
    /// Plugin author
    pub author: String,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: "0.0.1".to_string(),
            api_version: crate::API_VERSION,
            description: String::new(),
            author: String::new(),
        }
    }
}

/// A tenant the bot is a member of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
}

/// A platform user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

/// A user's membership in a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub tenant_id: TenantId,
    pub user: User,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

/// A posted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub author: User,
    pub content: String,
}

/// Reference to a message that may no longer be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub message_id: Snowflake,
    pub channel_id: Snowflake,
}

/// Kind of channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
    Category,
    Direct,
    Other,
}

/// A channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
}

/// Voice presence of a user; `channel_id` is `None` when not connected
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoiceState {
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub deafened: bool,
}

/// A reaction on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: Snowflake,
    pub channel_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: String,
}

/// Severity of a log record emitted by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Critical,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

/// A log record emitted by the upstream session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: LogSeverity,
    pub source: String,
    pub message: String,
}

/// An invocation of a remote command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Identity of the invoked command, as returned when it was created
    pub command_id: CommandId,
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl CommandInvocation {
    /// Get an option value by name
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options.get(name)
    }
}

/// What an interaction carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionKind {
    /// A command invocation
    Command(CommandInvocation),
    /// A message component (button, select menu) was used
    Component { custom_id: String },
    /// Anything the host does not interpret
    Other,
}

/// A user interaction with the bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    pub user: User,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

impl Interaction {
    /// The command invocation, if this interaction is one
    pub fn command(&self) -> Option<&CommandInvocation> {
        match &self.kind {
            InteractionKind::Command(invocation) => Some(invocation),
            _ => None,
        }
    }
}

/// Kind of presence activity shown for the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityKind {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Competing,
}

/// Presence activity shown for the bot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}
