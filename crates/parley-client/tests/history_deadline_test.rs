//! History deadline behavior under the paused tokio clock.
//!
//! A history fetch must settle within its deadline: with the reply it
//! arrives in time, with an empty history at the deadline — never before
//! it, never after it, and never as a rejection.

use std::sync::Arc;

use parley_client::{ChatSession, Credential, SessionConfig, UserId};
use parley_harness::{MemoryBroker, StaticRoomLookup};
use tokio::time::{Duration, advance};

fn new_session(broker: &MemoryBroker) -> ChatSession<MemoryBroker, StaticRoomLookup> {
    ChatSession::new(
        broker.clone(),
        StaticRoomLookup::new(),
        Credential::new("test-token"),
        &SessionConfig::default(),
    )
}

/// Let spawned tasks run up to their next suspension point without
/// advancing the clock.
async fn run_pending() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_resolves_empty_exactly_at_the_deadline() {
    let broker = MemoryBroker::new();
    let session = Arc::new(new_session(&broker));
    session.connect().await.expect("connect");

    let fetch = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.chat_history(UserId::new(7)).await })
    };
    run_pending().await;
    assert_eq!(broker.sent_to("/app/chat/history/7").len(), 1);

    // One second short of the deadline: still pending.
    advance(Duration::from_secs(19)).await;
    run_pending().await;
    assert!(!fetch.is_finished(), "must not resolve before the deadline");

    // Crossing the deadline settles it with an empty history.
    advance(Duration::from_millis(1001)).await;
    run_pending().await;
    assert!(fetch.is_finished(), "must not hang past the deadline");
    assert_eq!(fetch.await.expect("join").expect("fetch"), Vec::new());
}

#[tokio::test(start_paused = true)]
async fn reply_just_before_the_deadline_still_wins() {
    let broker = MemoryBroker::new();
    let session = Arc::new(new_session(&broker));
    session.connect().await.expect("connect");

    let fetch = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.chat_history(UserId::new(7)).await })
    };
    run_pending().await;

    advance(Duration::from_secs(19)).await;
    broker.publish(
        "/user/7/topic/chat/history",
        br#"[{"senderId":1,"receiverId":7,"message":"just in time"}]"#,
    );

    let history = fetch.await.expect("join").expect("fetch");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "just in time");
}

#[tokio::test(start_paused = true)]
async fn late_reply_after_timeout_is_discarded() {
    let broker = MemoryBroker::new();
    let session = Arc::new(new_session(&broker));
    session.connect().await.expect("connect");

    let fetch = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.chat_history(UserId::new(7)).await })
    };
    run_pending().await;
    advance(Duration::from_secs(21)).await;
    assert_eq!(fetch.await.expect("join").expect("fetch"), Vec::new());

    // The reply arrives after settlement; nothing is pending, so it is
    // dropped rather than buffered.
    broker.publish(
        "/user/7/topic/chat/history",
        br#"[{"senderId":1,"receiverId":7,"message":"stale"}]"#,
    );

    // A fresh fetch starts its own cycle and never sees the stale reply.
    let fetch = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.chat_history(UserId::new(7)).await })
    };
    run_pending().await;
    assert_eq!(broker.sent_to("/app/chat/history/7").len(), 2);

    advance(Duration::from_secs(21)).await;
    assert_eq!(fetch.await.expect("join").expect("fetch"), Vec::new());
}

#[tokio::test(start_paused = true)]
async fn custom_deadline_is_honored() {
    let broker = MemoryBroker::new();
    let config =
        SessionConfig { history_timeout: Duration::from_secs(5), ..SessionConfig::default() };
    let session = Arc::new(ChatSession::new(
        broker.clone(),
        StaticRoomLookup::new(),
        Credential::new("test-token"),
        &config,
    ));
    session.connect().await.expect("connect");

    let fetch = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.chat_history(UserId::new(3)).await })
    };
    run_pending().await;

    advance(Duration::from_millis(5001)).await;
    run_pending().await;
    assert!(fetch.is_finished());
    assert_eq!(fetch.await.expect("join").expect("fetch"), Vec::new());
}
