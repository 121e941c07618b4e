//! Upstream session boundary
//!
//! The host talks to the chat platform only through [`Session`]. The real
//! gateway transport lives outside this crate; [`LocalSession`] is the
//! in-memory implementation used for local runs, recordings and tests.

mod error;
mod events;
mod local;
mod replay;
mod traits;

pub use error::SessionError;
pub use events::GatewayEvent;
pub use local::{LocalSession, StoredCommand};
pub use replay::{read_events, write_events};
pub use traits::{Session, SessionFactory};
