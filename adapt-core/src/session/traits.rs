//! Session and SessionFactory traits

use std::sync::Arc;

use adapt_plugin_api::SessionHandle;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::SessionError;
use super::events::GatewayEvent;

/// The host's view of an upstream session.
///
/// Extends the plugin-facing [`SessionHandle`] with the parts only the host
/// uses: starting the connection and consuming its events.
#[async_trait]
pub trait Session: SessionHandle {
    /// Log in and connect
    async fn start(&self, token: &str) -> Result<(), SessionError>;

    /// Take the event receiver. The host subscribes exactly once; later
    /// calls return `None`.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<GatewayEvent>>;

    /// This session as the handle given to plugins
    fn as_handle(self: Arc<Self>) -> Arc<dyn SessionHandle>;
}

/// Factory for creating sessions
///
/// Enables dependency injection of the transport.
pub trait SessionFactory: Send + Sync {
    /// Create a new, not yet started session
    fn create(&self) -> Arc<dyn Session>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> Arc<dyn Session> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Session> {
        self()
    }
}
