//! adapt-plugin-api - Plugin API for the adapt bot host
//!
//! This crate provides the traits and types needed to write feature plugins
//! for adapt. A plugin reacts to gateway events, declares remote commands and
//! keeps global and per-tenant settings that the host persists for it.
//!
//! Plugins are either compiled into the host (see `adapt_core::PluginHost::with_built_in`)
//! or built as dynamic libraries that export their plugin table with
//! [`export_plugins!`].
//!
//! # Example
//!
//! ```ignore
//! use adapt_plugin_api::{export_plugin, Plugin, PluginContext, PluginError, PluginManifest};
//!
//! #[derive(Default)]
//! pub struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl Plugin for Greeter {
//!     fn manifest(&self) -> PluginManifest {
//!         PluginManifest {
//!             name: "Greeter".to_string(),
//!             description: "Says hello to new members".to_string(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     async fn on_user_joined(&mut self, member: &Member, ctx: &PluginContext) -> HookResult {
//!         ctx.log_info(&format!("{} joined", member.user.name));
//!         Ok(())
//!     }
//! }
//!
//! export_plugin!(Greeter);
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod listener;
pub mod session;
pub mod settings;
pub mod types;

pub use async_trait::async_trait;
pub use command::{
    CommandClient, CommandId, CommandScope, CommandSpec, OptionKind, OptionSpec,
    RegisteredCommand,
};
pub use context::PluginContext;
pub use error::PluginError;
pub use listener::{CommandCall, CommandListener, CommandListeners};
pub use session::SessionHandle;
pub use settings::{GlobalSettings, SettingsBlock, SettingsStore, TenantSettings};
pub use types::*;

/// Current plugin API version. Plugins must match this exactly.
/// This is checked when loading plugin libraries.
pub const API_VERSION: u32 = 1;

/// Symbol exported by plugin libraries returning [`API_VERSION`]
pub const API_VERSION_SYMBOL: &[u8] = b"_adapt_plugin_api_version";

/// Symbol exported by plugin libraries returning their plugin table
pub const PLUGIN_TYPES_SYMBOL: &[u8] = b"_adapt_plugin_types";

/// Result of a plugin hook
pub type HookResult = Result<(), PluginError>;

/// The plugin contract - implement this to create an adapt plugin.
///
/// Every hook has a default no-op implementation, so plugins only override
/// the ones they care about. A hook that returns `Err` (or panics) is logged
/// by the host and does not affect other plugins.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Return plugin metadata
    fn manifest(&self) -> PluginManifest;

    /// Wire the plugin to the host and register its settings.
    ///
    /// Called once, synchronously, right after the plugin is instantiated.
    /// Returning `Err` marks the plugin as failed: it stays listed but
    /// receives no events.
    fn initialize(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Declare remote commands.
    ///
    /// Called once after the first successful connection, and again each
    /// time an operator refreshes commands.
    async fn create_commands(
        &mut self,
        _commands: &dyn CommandClient,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when plugin is dropped, before its library is unloaded
    fn dispose(&mut self) {}

    // ─── Event Handlers (default no-ops) ─────────────────────────────

    /// Called when the session is ready (after every (re)connect)
    async fn on_ready(&mut self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called for each log record emitted by the session
    async fn on_log(&mut self, _record: &LogRecord, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a message is posted
    async fn on_message_received(&mut self, _message: &Message, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a message is removed
    async fn on_message_deleted(&mut self, _message: &MessageRef, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a user joins a tenant
    async fn on_user_joined(&mut self, _member: &Member, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a user leaves a tenant
    async fn on_user_left(
        &mut self,
        _tenant: &Tenant,
        _user: &User,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when a channel is created
    async fn on_channel_created(&mut self, _channel: &Channel, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a channel is destroyed
    async fn on_channel_destroyed(&mut self, _channel: &Channel, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a channel is updated
    async fn on_channel_updated(
        &mut self,
        _before: &Channel,
        _after: &Channel,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when a user's voice presence changes
    async fn on_voice_state_updated(
        &mut self,
        _user: &User,
        _before: &VoiceState,
        _after: &VoiceState,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when a reaction is added
    async fn on_reaction_added(&mut self, _reaction: &Reaction, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when a reaction is removed
    async fn on_reaction_removed(&mut self, _reaction: &Reaction, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when all reactions are cleared from a message
    async fn on_reactions_cleared(
        &mut self,
        _message: &MessageRef,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when a user's profile changes
    async fn on_user_updated(
        &mut self,
        _before: &User,
        _after: &User,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when a member's tenant profile (nickname, roles) changes
    async fn on_member_updated(
        &mut self,
        _before: Option<&Member>,
        _after: &Member,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called when the bot joins a tenant
    async fn on_tenant_joined(&mut self, _tenant: &Tenant, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called when the bot leaves a tenant
    async fn on_tenant_left(&mut self, _tenant: &Tenant, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called for every interaction, commands included
    async fn on_interaction_created(
        &mut self,
        _interaction: &Interaction,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called for every command invocation except the host's own refresh command.
    ///
    /// Plugins compare `invocation.command_id` with the ids they created, or
    /// attach listeners with [`PluginContext::listen`] instead.
    async fn on_command_received(
        &mut self,
        _interaction: &Interaction,
        _invocation: &CommandInvocation,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }
}

/// One entry of a plugin table: a named, default-constructible plugin type
#[derive(Clone, Copy)]
pub struct PluginType {
    /// Type name as written in the table
    pub type_name: &'static str,
    /// Construct a fresh instance
    pub create: fn() -> Box<dyn Plugin>,
}

impl PluginType {
    /// Table entry for `T`, constructed with `T::default()`
    pub const fn of<T: Plugin + Default + 'static>(type_name: &'static str) -> Self {
        Self {
            type_name,
            create: instantiate::<T>,
        }
    }

    /// Last path segment of the type name (`my_crate::Foo` -> `Foo`)
    pub fn short_name(&self) -> &'static str {
        self.type_name
            .rsplit("::")
            .next()
            .unwrap_or(self.type_name)
            .trim()
    }
}

impl std::fmt::Debug for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn instantiate<T: Plugin + Default + 'static>() -> Box<dyn Plugin> {
    Box::new(T::default())
}

/// Export plugin types for dynamic loading.
///
/// Generates the entry points adapt looks up when it opens a plugin library.
/// A library may export any number of plugin types.
///
/// # Usage
///
/// ```ignore
/// adapt_plugin_api::export_plugins!(BirthdayRoles, BirthdayAnnouncer);
/// ```
///
/// # Generated Functions
///
/// - `_adapt_plugin_api_version()`: Returns the API version
/// - `_adapt_plugin_types()`: Returns the plugin table
#[macro_export]
macro_rules! export_plugins {
    ($($plugin_type:ty),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _adapt_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub fn _adapt_plugin_types() -> &'static [$crate::PluginType] {
            static TYPES: &[$crate::PluginType] = &[
                $($crate::PluginType::of::<$plugin_type>(stringify!($plugin_type))),+
            ];
            TYPES
        }
    };
}

/// Export a single plugin type for dynamic loading.
///
/// Shorthand for [`export_plugins!`] with one type.
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        $crate::export_plugins!($plugin_type);
    };
}
