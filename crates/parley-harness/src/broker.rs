//! In-memory broker implementing the transport seam.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use parley_client::{MessageHandler, SubscriptionHandle, Transport, TransportError};
use tokio::sync::watch;

/// One payload handed to the transport, as the broker saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination the payload was published to.
    pub destination: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct BrokerInner {
    connected: bool,
    handshakes: u32,
    fail_next_connect: bool,
    next_subscription: u64,
    subscriptions: HashMap<u64, (String, MessageHandler)>,
    sent: Vec<SentMessage>,
}

/// In-process broker double.
///
/// Cloning shares the same broker, so a test keeps a handle while the
/// session under test owns another. Connect outcomes are scripted
/// ([`hold_connects`](Self::hold_connects),
/// [`fail_next_connect`](Self::fail_next_connect)), every publish is
/// recorded, and [`publish`](Self::publish) drives subscribed handlers
/// the way a broker delivery would.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
    /// `true` while connect attempts are held open by the test.
    gate: Arc<watch::Sender<bool>>,
}

impl MemoryBroker {
    /// Create a disconnected broker.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self { inner: Arc::new(Mutex::new(BrokerInner::default())), gate: Arc::new(gate) }
    }

    /// Hold subsequent connect attempts open until
    /// [`release_connects`](Self::release_connects).
    pub fn hold_connects(&self) {
        self.gate.send_replace(true);
    }

    /// Release connect attempts held by [`hold_connects`](Self::hold_connects).
    pub fn release_connects(&self) {
        self.gate.send_replace(false);
    }

    /// Make the next connect attempt fail with a connection error.
    pub fn fail_next_connect(&self) {
        self.lock().fail_next_connect = true;
    }

    /// Mark the broker connected without a handshake, for tests that
    /// exercise a component below the session.
    pub fn mark_connected(&self) {
        self.lock().connected = true;
    }

    /// Number of handshakes started so far.
    #[must_use]
    pub fn handshake_count(&self) -> u32 {
        self.lock().handshakes
    }

    /// Whether the broker currently considers itself connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Everything published so far, in publish order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Payloads published to one destination, in publish order.
    #[must_use]
    pub fn sent_to(&self, destination: &str) -> Vec<Vec<u8>> {
        self.lock()
            .sent
            .iter()
            .filter(|m| m.destination == destination)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Number of live subscriptions for one destination.
    #[must_use]
    pub fn subscriptions_for(&self, destination: &str) -> usize {
        self.lock().subscriptions.values().filter(|(d, _)| d == destination).count()
    }

    /// Deliver a payload to every handler subscribed to `destination`.
    pub fn publish(&self, destination: &str, payload: &[u8]) {
        // Handlers run outside the lock so they may call back into the
        // broker.
        let handlers: Vec<MessageHandler> = self
            .lock()
            .subscriptions
            .values()
            .filter(|(d, _)| d == destination)
            .map(|(_, h)| Arc::clone(h))
            .collect();

        tracing::debug!(destination, handlers = handlers.len(), "delivering payload");
        for handler in handlers {
            handler(payload);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn connect(&self, _headers: &[(String, String)]) -> Result<(), TransportError> {
        self.lock().handshakes += 1;

        let mut held = self.gate.subscribe();
        let _ = held.wait_for(|held| !held).await;

        let mut inner = self.lock();
        if inner.fail_next_connect {
            inner.fail_next_connect = false;
            return Err(TransportError::Connection("injected failure".to_string()));
        }
        inner.connected = true;
        Ok(())
    }

    async fn send(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(TransportError::Stream("not connected".to_string()));
        }
        inner
            .sent
            .push(SentMessage { destination: destination.to_string(), payload: payload.to_vec() });
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle, TransportError> {
        let mut inner = self.lock();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.subscriptions.insert(id, (destination.to_string(), handler));
        Ok(SubscriptionHandle::new(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        if self.lock().subscriptions.remove(&handle.id()).is_none() {
            return Err(TransportError::Stream(format!("unknown subscription {}", handle.id())));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.lock().connected = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn publish_reaches_only_matching_subscriptions() {
        let broker = MemoryBroker::new();
        let hits = Arc::new(AtomicU32::new(0));

        let handler = {
            let hits = Arc::clone(&hits);
            Arc::new(move |_: &[u8]| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        broker.subscribe("/topic/a", handler).await.unwrap();

        broker.publish("/topic/a", b"x");
        broker.publish("/topic/b", b"x");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_requires_a_connection() {
        let broker = MemoryBroker::new();

        let err = broker.send("/app/chat", b"{}").await.unwrap_err();
        assert!(matches!(err, TransportError::Stream(_)));

        broker.connect(&[]).await.unwrap();
        broker.send("/app/chat", b"{}").await.unwrap();
        assert_eq!(broker.sent_to("/app/chat").len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_consumes_itself() {
        let broker = MemoryBroker::new();
        broker.fail_next_connect();

        assert!(broker.connect(&[]).await.is_err());
        assert!(broker.connect(&[]).await.is_ok());
        assert_eq!(broker.handshake_count(), 2);
    }
}
