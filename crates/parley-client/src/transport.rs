//! Transport seam between the session manager and the broker socket.
//!
//! The broker is reachable over one persistent, authenticated, ordered
//! message channel. The session manager only needs the five operations
//! below; the production WebSocket implementation lives behind the
//! `transport` feature, and tests substitute an in-memory broker.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Callback invoked with the raw body of each message a subscription
/// receives.
///
/// Handlers run on the transport's delivery context and must not block;
/// they hand work off (settle a waiter, invoke a UI callback) and return.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Opaque identity of one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a transport-assigned subscription id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw subscription id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// A persistent, authenticated, ordered message channel to the broker.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform the authenticated handshake.
    ///
    /// Callers (the session) guarantee at most one handshake is in flight
    /// at a time; implementations need not deduplicate.
    async fn connect(&self, headers: &[(String, String)]) -> Result<(), TransportError>;

    /// Publish a payload to a destination. "Sent" means handed to the
    /// transport; no broker acknowledgment is awaited.
    async fn send(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Open a subscription; `handler` fires once per delivered message.
    async fn subscribe(
        &self,
        destination: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle, TransportError>;

    /// Close a previously opened subscription.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError>;

    /// Close the connection. Infallible; a transport that is already
    /// closed treats this as a no-op.
    async fn disconnect(&self);
}
