//! Remote command types and the client plugins use to create them

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::types::TenantId;

/// Identity of a created remote command.
///
/// Plugins keep the id they get back from [`CommandClient`] and compare it
/// against [`CommandInvocation::command_id`](crate::CommandInvocation) to
/// recognise their own commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u64);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a command is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "tenant_id", rename_all = "snake_case")]
pub enum CommandScope {
    /// Visible in every tenant
    Global,
    /// Visible in one tenant only
    Tenant(TenantId),
}

/// Type of a command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
}

/// Specification for a command option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option name
    pub name: String,
    /// Description for help text
    pub description: String,
    /// Option type
    pub kind: OptionKind,
    /// Whether this option is required
    pub required: bool,
}

/// Specification for a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name, e.g. `birthday` -> `/birthday`
    pub name: String,
    /// Short description shown to users
    pub description: String,
    /// Options
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

impl CommandSpec {
    /// Create a command without options
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    /// Builder: add an option
    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Check the naming rules of the remote platform.
    ///
    /// Names are 1-32 characters of lowercase ASCII letters, digits, `-` or `_`.
    /// Option names must be unique.
    pub fn validate(&self) -> Result<(), PluginError> {
        validate_name(&self.name)?;
        if self.description.is_empty() {
            return Err(PluginError::InvalidInput(format!(
                "command '{}' has an empty description",
                self.name
            )));
        }
        for (i, option) in self.options.iter().enumerate() {
            validate_name(&option.name)?;
            if self.options[..i].iter().any(|o| o.name == option.name) {
                return Err(PluginError::InvalidInput(format!(
                    "command '{}' declares option '{}' twice",
                    self.name, option.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), PluginError> {
    let valid_len = (1..=32).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(PluginError::InvalidInput(format!(
            "invalid command name '{name}'"
        )))
    }
}

/// A command as it exists on the remote platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredCommand {
    pub id: CommandId,
    pub name: String,
    pub scope: CommandScope,
    /// Names of the options the command declares
    #[serde(default)]
    pub options: Vec<String>,
}

impl RegisteredCommand {
    /// The registration of `spec` under `id`
    pub fn from_spec(id: CommandId, scope: CommandScope, spec: &CommandSpec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            scope,
            options: spec.options.iter().map(|o| o.name.clone()).collect(),
        }
    }

    /// Whether the command declares an option with this name
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|o| o == name)
    }
}

/// Client for creating, listing and deleting remote commands
#[async_trait]
pub trait CommandClient: Send + Sync {
    /// Create a command visible in every tenant
    async fn create_global_command(
        &self,
        spec: CommandSpec,
    ) -> Result<RegisteredCommand, PluginError>;

    /// Create a command visible in one tenant
    async fn create_tenant_command(
        &self,
        tenant: TenantId,
        spec: CommandSpec,
    ) -> Result<RegisteredCommand, PluginError>;

    /// List all global commands owned by this application
    async fn global_commands(&self) -> Result<Vec<RegisteredCommand>, PluginError>;

    /// List all commands owned by this application in one tenant
    async fn tenant_commands(&self, tenant: TenantId)
    -> Result<Vec<RegisteredCommand>, PluginError>;

    /// Delete a command
    async fn delete_command(&self, command: &RegisteredCommand) -> Result<(), PluginError>;
}
