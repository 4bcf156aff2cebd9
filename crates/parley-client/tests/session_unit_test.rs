//! Connection-session unit tests, relocated to an integration test to
//! avoid the dev-dependency cycle (parley-harness depends on parley-client).

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use parley_client::{ClientError, ConnectionSession, ConnectionState, Credential};
use parley_harness::MemoryBroker;

fn session(broker: &MemoryBroker) -> ConnectionSession<MemoryBroker> {
    ConnectionSession::new(Arc::new(broker.clone()), Credential::new("token"))
}

#[tokio::test]
async fn concurrent_connects_share_one_handshake() {
    let broker = MemoryBroker::new();
    broker.hold_connects();
    let session = Arc::new(session(&broker));

    let release = {
        let broker = broker.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            broker.release_connects();
        })
    };

    let (first, second) = tokio::join!(session.connect(), session.connect());
    release.await.unwrap();

    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert_eq!(broker.handshake_count(), 1);
    assert!(session.is_connected());
}

#[tokio::test]
async fn connect_when_already_connected_is_a_no_op() {
    let broker = MemoryBroker::new();
    let session = session(&broker);

    session.connect().await.unwrap();
    session.connect().await.unwrap();

    assert_eq!(broker.handshake_count(), 1);
}

#[tokio::test]
async fn failed_connect_reports_and_allows_retry() {
    let broker = MemoryBroker::new();
    broker.fail_next_connect();
    let session = session(&broker);

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }));
    assert_eq!(session.state(), ConnectionState::Failed);

    // The in-flight marker was cleared, so a retry starts fresh.
    session.connect().await.unwrap();
    assert_eq!(broker.handshake_count(), 2);
    assert!(session.is_connected());
}

#[tokio::test]
async fn disconnect_is_safe_when_never_connected() {
    let broker = MemoryBroker::new();
    let session = session(&broker);

    session.disconnect().await;

    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn watchers_observe_each_transition() {
    let broker = MemoryBroker::new();
    broker.hold_connects();
    let session = Arc::new(session(&broker));
    let mut states = session.watch();

    let connecting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.connect().await })
    };

    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), ConnectionState::Connecting);

    broker.release_connects();
    connecting.await.unwrap().unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), ConnectionState::Connected);
}
