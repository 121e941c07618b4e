//! adapt-core: Core library for the adapt bot host
//!
//! This crate provides the host side of adapt:
//!
//! - **Plugins** - [`PluginHost`], the loader, component registry, event
//!   dispatcher and command lifecycle
//! - **Settings** - [`SettingsRegistry`] for global and per-tenant plugin settings
//! - **Session** - the [`Session`] boundary to the chat platform, plus the
//!   in-memory [`LocalSession`]
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  events  ┌────────────┐  hooks  ┌──────────────┐
//! │  Session   │─────────▶│ PluginHost │────────▶│  Dispatcher  │──▶ plugins
//! └────────────┘          └─────┬──────┘         └──────────────┘
//!                               │ tenants
//!                        ┌──────▼───────────┐
//!                        │ SettingsRegistry │◀── PluginContext
//!                        └──────────────────┘
//! ```

pub mod error;
pub mod plugins;
pub mod session;
pub mod settings;

pub use error::AdaptError;
pub use plugins::{PluginHost, PluginHostConfig};
pub use session::{GatewayEvent, LocalSession, Session, SessionFactory};
pub use settings::{SettingsLayout, SettingsRegistry};
