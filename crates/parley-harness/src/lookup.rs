//! Scripted room directory implementing the lookup seam.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use parley_client::{ClientError, RoomLookup};
use parley_core::{ParticipantPair, RoomName, UserId};
use tokio::sync::watch;

#[derive(Default)]
struct LookupInner {
    rooms: HashMap<ParticipantPair, RoomName>,
    calls: u32,
    fail_next: bool,
}

/// Room lookup double backed by a scripted table.
///
/// Cloning shares the same table. Calls are counted, the next call can be
/// scripted to fail, and lookups can be held open to observe in-flight
/// sharing.
#[derive(Clone)]
pub struct StaticRoomLookup {
    inner: Arc<Mutex<LookupInner>>,
    /// `true` while lookups are held open by the test.
    gate: Arc<watch::Sender<bool>>,
}

impl StaticRoomLookup {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self { inner: Arc::new(Mutex::new(LookupInner::default())), gate: Arc::new(gate) }
    }

    /// Script the room name for a pair (either order).
    pub fn insert(&self, a: UserId, b: UserId, room: impl Into<String>) {
        self.lock().rooms.insert(ParticipantPair::new(a, b), RoomName::new(room));
    }

    /// Number of lookup calls performed so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.lock().calls
    }

    /// Make the next lookup call fail.
    pub fn fail_next_lookup(&self) {
        self.lock().fail_next = true;
    }

    /// Hold subsequent lookups open until
    /// [`release_lookups`](Self::release_lookups).
    pub fn hold_lookups(&self) {
        self.gate.send_replace(true);
    }

    /// Release lookups held by [`hold_lookups`](Self::hold_lookups).
    pub fn release_lookups(&self) {
        self.gate.send_replace(false);
    }

    fn lock(&self) -> MutexGuard<'_, LookupInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for StaticRoomLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomLookup for StaticRoomLookup {
    async fn room_name(&self, pair: ParticipantPair) -> Result<RoomName, ClientError> {
        self.lock().calls += 1;

        let mut held = self.gate.subscribe();
        let _ = held.wait_for(|held| !held).await;

        let mut inner = self.lock();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(ClientError::Lookup { reason: "injected failure".to_string() });
        }
        inner
            .rooms
            .get(&pair)
            .cloned()
            .ok_or_else(|| ClientError::Lookup { reason: format!("no room for pair {pair}") })
    }
}
