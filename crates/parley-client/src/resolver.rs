//! Room-name resolution with per-pair memoization.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parley_core::{ParticipantPair, RoomName};
use tokio::sync::Mutex;

use crate::ClientError;

/// Outcome of one lookup attempt, shared between its waiters.
type ResolveFuture = Shared<BoxFuture<'static, Result<RoomName, ClientError>>>;

/// External side-channel that maps a participant pair to its room name.
#[async_trait]
pub trait RoomLookup: Send + Sync + 'static {
    /// Resolve the canonical room name for a normalized pair.
    async fn room_name(&self, pair: ParticipantPair) -> Result<RoomName, ClientError>;
}

/// Memoizing resolver over a [`RoomLookup`].
///
/// Pairs are normalized by construction ([`ParticipantPair`]), so
/// `(a, b)` and `(b, a)` share one cache entry. Concurrent calls for the
/// same uncached pair join the same in-flight lookup — the external call
/// runs at most once per pair per attempt. Failures are delivered to
/// every waiter of that attempt and are never cached; a later call
/// retries.
pub struct RoomResolver<L> {
    lookup: Arc<L>,
    cache: Arc<Mutex<ResolveCache>>,
}

#[derive(Default)]
struct ResolveCache {
    resolved: HashMap<ParticipantPair, RoomName>,
    in_flight: HashMap<ParticipantPair, ResolveFuture>,
}

impl<L: RoomLookup> RoomResolver<L> {
    /// Create a resolver over `lookup` with an empty cache.
    pub fn new(lookup: Arc<L>) -> Self {
        Self { lookup, cache: Arc::new(Mutex::new(ResolveCache::default())) }
    }

    /// Resolve the room name for `pair`, consulting the cache first.
    pub async fn resolve(&self, pair: ParticipantPair) -> Result<RoomName, ClientError> {
        let attempt = {
            let mut cache = self.cache.lock().await;
            if let Some(room) = cache.resolved.get(&pair) {
                return Ok(room.clone());
            }
            if let Some(attempt) = cache.in_flight.get(&pair) {
                attempt.clone()
            } else {
                let attempt = self.start_lookup(pair);
                cache.in_flight.insert(pair, attempt.clone());
                attempt
            }
        };

        attempt.await
    }

    /// The in-flight marker is inserted by the caller before any
    /// suspension; this future removes it exactly once, on settlement.
    fn start_lookup(&self, pair: ParticipantPair) -> ResolveFuture {
        let lookup = Arc::clone(&self.lookup);
        let cache = Arc::clone(&self.cache);

        async move {
            let result = lookup.room_name(pair).await;

            let mut cache = cache.lock().await;
            cache.in_flight.remove(&pair);
            match &result {
                Ok(room) => {
                    tracing::debug!(%pair, room = %room, "resolved room name");
                    cache.resolved.insert(pair, room.clone());
                },
                Err(e) => tracing::warn!(%pair, error = %e, "room lookup failed"),
            }

            result
        }
        .boxed()
        .shared()
    }
}
