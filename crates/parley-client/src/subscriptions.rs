//! Subscription tracking with first-subscriber-wins deduplication.

use std::{collections::HashMap, sync::Arc};

use parley_core::SubscriptionKey;
use tokio::sync::Mutex;

use crate::{ClientError, MessageHandler, SubscriptionHandle, Transport};

/// Tracks the live broker subscriptions of one session.
///
/// # Invariants
///
/// - At most one live subscription exists per [`SubscriptionKey`];
///   [`len`](Self::len) equals the number of distinct active keys.
/// - The first handler registered for a key stays in effect until
///   [`clear_all`](Self::clear_all); later handlers for the same key are
///   discarded. Repeated setup calls (UI re-renders) therefore never
///   duplicate broker subscriptions.
pub struct SubscriptionRegistry<T> {
    transport: Arc<T>,
    entries: Mutex<HashMap<SubscriptionKey, SubscriptionHandle>>,
}

impl<T: Transport> SubscriptionRegistry<T> {
    /// Create an empty registry over `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport, entries: Mutex::new(HashMap::new()) }
    }

    /// Subscribe `handler` to `destination` under `key`, unless `key`
    /// already has a live entry.
    ///
    /// The map lock is held across the subscribe call so concurrent
    /// requests for the same key cannot both reach the transport.
    pub async fn ensure_subscribed(
        &self,
        key: SubscriptionKey,
        destination: &str,
        handler: MessageHandler,
    ) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&key) {
            tracing::debug!(?key, "subscription already active, reusing");
            return Ok(());
        }

        let handle = self
            .transport
            .subscribe(destination, handler)
            .await
            .map_err(|e| ClientError::Subscribe { reason: e.to_string() })?;
        tracing::debug!(?key, destination, "opened subscription");
        entries.insert(key, handle);

        Ok(())
    }

    /// Unsubscribe every tracked entry and empty the registry.
    ///
    /// Teardown is best-effort: a transport that refuses an unsubscribe
    /// mid-shutdown cannot be retried, so failures are logged and skipped.
    pub async fn clear_all(&self) {
        let drained: Vec<_> = self.entries.lock().await.drain().collect();
        for (key, handle) in drained {
            if let Err(e) = self.transport.unsubscribe(handle).await {
                tracing::warn!(?key, error = %e, "failed to unsubscribe during teardown");
            }
        }
    }

    /// Number of live subscriptions.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no subscriptions are live.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
