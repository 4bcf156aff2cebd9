//! Room-resolver unit tests, relocated to an integration test to avoid
//! the dev-dependency cycle (parley-harness depends on parley-client).

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use parley_client::{ClientError, RoomName, RoomResolver, UserId};
use parley_core::ParticipantPair;
use parley_harness::StaticRoomLookup;

fn resolver(lookup: &StaticRoomLookup) -> RoomResolver<StaticRoomLookup> {
    RoomResolver::new(Arc::new(lookup.clone()))
}

#[tokio::test]
async fn both_orders_share_one_lookup() {
    let lookup = StaticRoomLookup::new();
    lookup.insert(UserId::new(1), UserId::new(2), "room-a");
    let resolver = resolver(&lookup);

    let forward =
        resolver.resolve(ParticipantPair::new(UserId::new(1), UserId::new(2))).await.unwrap();
    let reverse =
        resolver.resolve(ParticipantPair::new(UserId::new(2), UserId::new(1))).await.unwrap();

    assert_eq!(forward, reverse);
    assert_eq!(lookup.call_count(), 1);
}

#[tokio::test]
async fn concurrent_resolves_join_one_attempt() {
    let lookup = StaticRoomLookup::new();
    lookup.insert(UserId::new(3), UserId::new(4), "room-b");
    lookup.hold_lookups();
    let resolver = Arc::new(resolver(&lookup));
    let pair = ParticipantPair::new(UserId::new(3), UserId::new(4));

    let release = {
        let lookup = lookup.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            lookup.release_lookups();
        })
    };

    let (first, second) = tokio::join!(resolver.resolve(pair), resolver.resolve(pair));
    release.await.unwrap();

    assert_eq!(first.unwrap(), RoomName::new("room-b"));
    assert_eq!(second.unwrap(), RoomName::new("room-b"));
    assert_eq!(lookup.call_count(), 1);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let lookup = StaticRoomLookup::new();
    lookup.insert(UserId::new(5), UserId::new(6), "room-c");
    lookup.fail_next_lookup();
    let resolver = resolver(&lookup);
    let pair = ParticipantPair::new(UserId::new(5), UserId::new(6));

    let err = resolver.resolve(pair).await.unwrap_err();
    assert!(matches!(err, ClientError::Lookup { .. }));

    // Retry performs a fresh external call and succeeds.
    assert_eq!(resolver.resolve(pair).await.unwrap(), RoomName::new("room-c"));
    assert_eq!(lookup.call_count(), 2);
}

#[tokio::test]
async fn unknown_pair_is_a_lookup_error() {
    let lookup = StaticRoomLookup::new();
    let resolver = resolver(&lookup);

    let err = resolver
        .resolve(ParticipantPair::new(UserId::new(8), UserId::new(9)))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Lookup { .. }));
}
