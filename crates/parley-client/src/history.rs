//! Request/response emulation for history fetches.
//!
//! The broker only speaks pub/sub, so "fetch history for user X" becomes:
//! subscribe to the user's reply topic, publish a command message, and
//! wait for the reply with a deadline. A timeout is not an error — it
//! settles the fetch with an empty history ("nothing available yet"), so
//! consumers need no special case.
//!
//! Reply-channel policy: the per-user reply subscription stays registered
//! after settlement and is torn down only with the session. A reply that
//! arrives when no fetch is pending (late answer after a timeout) is
//! discarded; it never surfaces and never satisfies a later fetch.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard},
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parley_core::{ChatMessage, SubscriptionKey, UserId, history_request_destination, history_topic};
use tokio::sync::{Mutex, oneshot};

use crate::{ClientError, MessageHandler, SubscriptionRegistry, Transport};

/// Outcome of one fetch cycle, shared between its waiters.
type HistoryFuture = Shared<BoxFuture<'static, Result<Vec<ChatMessage>, ClientError>>>;

/// Reply waiters, settled synchronously from the transport's delivery
/// context.
type Waiters = Arc<StdMutex<HashMap<UserId, oneshot::Sender<Vec<ChatMessage>>>>>;

/// One-shot history fetches over the pub/sub substrate.
///
/// At most one command/reply cycle is open per user: a second fetch for
/// the same user while one is pending joins the in-flight cycle instead
/// of opening a parallel one. Every cycle settles within the configured
/// deadline.
pub struct HistoryRequestBridge<T> {
    transport: Arc<T>,
    registry: Arc<SubscriptionRegistry<T>>,
    timeout: Duration,
    in_flight: Arc<Mutex<HashMap<UserId, HistoryFuture>>>,
    waiters: Waiters,
}

impl<T: Transport> HistoryRequestBridge<T> {
    /// Create a bridge publishing over `transport` and subscribing
    /// through `registry`.
    pub fn new(transport: Arc<T>, registry: Arc<SubscriptionRegistry<T>>, timeout: Duration) -> Self {
        Self {
            transport,
            registry,
            timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            waiters: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Fetch the chat history for `user`.
    ///
    /// Resolves with the reply payload, or with an empty history at the
    /// deadline. The only rejection paths are transport refusals of the
    /// reply subscription or the command publish.
    pub async fn fetch(&self, user: UserId) -> Result<Vec<ChatMessage>, ClientError> {
        let cycle = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(cycle) = in_flight.get(&user) {
                tracing::debug!(%user, "history fetch already pending, joining");
                cycle.clone()
            } else {
                let cycle = self.start_cycle(user);
                in_flight.insert(user, cycle.clone());
                cycle
            }
        };

        cycle.await
    }

    /// Settle every pending fetch with an empty history.
    ///
    /// Invoked during session teardown; each waiter resolves exactly once.
    pub fn settle_all_empty(&self) {
        let drained: Vec<_> = lock_waiters(&self.waiters).drain().collect();
        for (user, reply) in drained {
            tracing::debug!(%user, "settling pending history fetch empty on disconnect");
            let _ = reply.send(Vec::new());
        }
    }

    /// The in-flight marker is inserted by the caller before any
    /// suspension; this future clears marker and waiter exactly once, on
    /// settlement.
    fn start_cycle(&self, user: UserId) -> HistoryFuture {
        let transport = Arc::clone(&self.transport);
        let registry = Arc::clone(&self.registry);
        let in_flight = Arc::clone(&self.in_flight);
        let waiters = Arc::clone(&self.waiters);
        let deadline = self.timeout;

        async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            lock_waiters(&waiters).insert(user, reply_tx);

            let handler = reply_handler(user, Arc::clone(&waiters));
            let subscribed = registry
                .ensure_subscribed(SubscriptionKey::history(user), &history_topic(user), handler)
                .await;
            if let Err(e) = subscribed {
                clear_cycle(&in_flight, &waiters, user).await;
                return Err(e);
            }

            let sent = transport.send(&history_request_destination(user), b"{}").await;
            if let Err(e) = sent {
                clear_cycle(&in_flight, &waiters, user).await;
                return Err(ClientError::Send { reason: e.to_string() });
            }
            tracing::debug!(%user, "history request published");

            let outcome = tokio::time::timeout(deadline, reply_rx).await;
            clear_cycle(&in_flight, &waiters, user).await;

            match outcome {
                Ok(Ok(history)) => {
                    tracing::debug!(%user, count = history.len(), "history reply received");
                    Ok(history)
                },
                // Waiter dropped without a reply (session teardown race):
                // same contract as a timeout.
                Ok(Err(_)) => Ok(Vec::new()),
                Err(_) => {
                    tracing::debug!(%user, "history request timed out, resolving empty");
                    Ok(Vec::new())
                },
            }
        }
        .boxed()
        .shared()
    }
}

/// Handler for the per-user reply topic. Registered once per user (the
/// registry deduplicates) and left in place across fetch cycles.
fn reply_handler(user: UserId, waiters: Waiters) -> MessageHandler {
    Arc::new(move |payload: &[u8]| {
        let history: Vec<ChatMessage> = match serde_json::from_slice(payload) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(%user, error = %e, "malformed history payload, dropping");
                return;
            },
        };

        match lock_waiters(&waiters).remove(&user) {
            Some(reply) => {
                let _ = reply.send(history);
            },
            None => tracing::debug!(%user, "history reply with no pending fetch, discarding"),
        }
    })
}

async fn clear_cycle(
    in_flight: &Mutex<HashMap<UserId, HistoryFuture>>,
    waiters: &StdMutex<HashMap<UserId, oneshot::Sender<Vec<ChatMessage>>>>,
    user: UserId,
) {
    in_flight.lock().await.remove(&user);
    lock_waiters(waiters).remove(&user);
}

/// A handler that panicked mid-settle must not wedge later fetches.
fn lock_waiters<'a>(
    waiters: &'a StdMutex<HashMap<UserId, oneshot::Sender<Vec<ChatMessage>>>>,
) -> MutexGuard<'a, HashMap<UserId, oneshot::Sender<Vec<ChatMessage>>>> {
    match waiters.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
