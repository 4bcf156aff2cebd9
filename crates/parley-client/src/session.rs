//! Connection lifecycle: connect once, share the outcome.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parley_core::{ConnectionState, Credential};
use tokio::sync::{Mutex, watch};

use crate::{ClientError, Transport};

/// Outcome of one handshake attempt, shared between every caller that
/// joined it.
type ConnectFuture = Shared<BoxFuture<'static, Result<(), ClientError>>>;

/// Owner of the single transport connection.
///
/// `connect` is idempotent and safe to call concurrently: while a
/// handshake is in flight all callers await the same shared future, so at
/// most one handshake ever runs. State changes are published through a
/// [`watch`] channel and are synchronous with connect/disconnect
/// settlement — dependents observe them without polling.
pub struct ConnectionSession<T> {
    transport: Arc<T>,
    credential: Credential,
    state: Arc<watch::Sender<ConnectionState>>,
    in_flight: Arc<Mutex<Option<ConnectFuture>>>,
    /// Bumped by `disconnect` so a handshake that was in flight when the
    /// session tore down cannot resurrect the `Connected` state.
    generation: Arc<AtomicU64>,
}

impl<T: Transport> ConnectionSession<T> {
    /// Create a session over `transport`, authenticated by `credential`.
    pub fn new(transport: Arc<T>, credential: Credential) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            credential,
            state: Arc::new(state),
            in_flight: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the transport is currently usable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Observe state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Establish the connection, sharing any in-flight attempt.
    ///
    /// Resolves immediately when already connected. On failure the session
    /// moves to [`ConnectionState::Failed`], the in-flight marker is
    /// cleared, and a subsequent call may retry.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let attempt = {
            let mut in_flight = self.in_flight.lock().await;
            if self.state().is_connected() {
                return Ok(());
            }
            if let Some(attempt) = in_flight.as_ref() {
                attempt.clone()
            } else {
                let attempt = self.start_handshake();
                *in_flight = Some(attempt.clone());
                attempt
            }
        };

        attempt.await
    }

    /// Spawnless handshake future; every joining caller polls the same
    /// shared instance. The marker must be set before the first suspension
    /// and is cleared exactly once, on settlement.
    fn start_handshake(&self) -> ConnectFuture {
        self.state.send_replace(ConnectionState::Connecting);

        let transport = Arc::clone(&self.transport);
        let headers = self.credential.connect_headers();
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        let generation = Arc::clone(&self.generation);
        let started_at = generation.load(Ordering::SeqCst);

        async move {
            let result = transport
                .connect(&headers)
                .await
                .map_err(|e| ClientError::Connection { reason: e.to_string() });

            let mut marker = in_flight.lock().await;
            // A disconnect while we were connecting already cleared the
            // marker and owns the state; only settle our own attempt.
            if generation.load(Ordering::SeqCst) == started_at {
                *marker = None;
                match &result {
                    Ok(()) => {
                        tracing::debug!("connected to broker");
                        state.send_replace(ConnectionState::Connected);
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "broker handshake failed");
                        state.send_replace(ConnectionState::Failed);
                    },
                }
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Close the transport and reset bookkeeping.
    ///
    /// Safe to call in any state; when not connected it only clears the
    /// in-flight marker. Subscription and pending-request teardown is
    /// orchestrated by the facade before this runs.
    pub async fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if self.is_connected() {
            self.transport.disconnect().await;
            tracing::debug!("disconnected from broker");
        }

        *self.in_flight.lock().await = None;
        self.state.send_replace(ConnectionState::Disconnected);
    }
}
