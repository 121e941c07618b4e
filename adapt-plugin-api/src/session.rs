//! The upstream session as seen by plugins

use async_trait::async_trait;

use crate::command::CommandClient;
use crate::error::PluginError;
use crate::types::{Activity, Snowflake, Tenant};

/// Handle to the connected platform session.
///
/// Plugins use it to issue remote calls. The host owns the connection
/// itself; plugins never start or stop it.
#[async_trait]
pub trait SessionHandle: CommandClient {
    /// Tenants the bot is currently a member of
    fn tenants(&self) -> Vec<Tenant>;

    /// Set the presence activity shown for the bot
    async fn set_activity(&self, activity: Activity) -> Result<(), PluginError>;

    /// Reply to an interaction
    async fn respond(&self, interaction_id: Snowflake, content: &str) -> Result<(), PluginError>;

    /// This session viewed as a plain command client
    fn command_client(&self) -> &dyn CommandClient;
}
