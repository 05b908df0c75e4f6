//! Presence Integration Tests
//!
//! Several simulated clients share one in-process store, each with its own
//! connection and lifecycle coordinator.
//!
//! Run with: cargo test -p integration-tests --test presence_tests

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use integration_tests::{client_id, identity, within, TestClient};
use presence_cache::MemoryPresenceStore;
use presence_core::{KeyPrefix, PresenceError, PresenceStatus, DEFAULT_DISPLAY_NAME};
use presence_service::{
    LifecyclePhase, OnlineSetFeed, PresencePublisher, PresenceSubscriber, Retraction,
};

fn publisher(store: &MemoryPresenceStore) -> PresencePublisher {
    PresencePublisher::new(Arc::new(store.connect()), KeyPrefix::default())
}

fn subscriber(store: &MemoryPresenceStore) -> PresenceSubscriber {
    PresenceSubscriber::new(Arc::new(store.connect()), KeyPrefix::default())
}

/// Read the feed until it yields exactly `expected`, logging each distinct set
async fn advance_to(feed: &mut OnlineSetFeed, seen: &mut Vec<Vec<String>>, expected: &[&str]) {
    loop {
        let set = within(feed.next()).await.unwrap().unwrap();
        let ids: Vec<String> = set.ids().into_iter().map(str::to_string).collect();
        if seen.last() != Some(&ids) {
            seen.push(ids.clone());
        }
        if ids == expected {
            break;
        }
    }
}

// ============================================================================
// Publisher Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_publish_keeps_one_record_per_id() {
    let store = MemoryPresenceStore::new();
    let first = publisher(&store);
    let second = publisher(&store);
    let session = identity("alice", "Alice").into_session(DEFAULT_DISPLAY_NAME);

    let (a, b) = tokio::join!(first.publish(&session), second.publish(&session));
    a.unwrap();
    b.unwrap();

    let snapshot = store.snapshot(&KeyPrefix::default());
    assert_eq!(snapshot.len(), 1);
    let record = snapshot.get(&client_id("alice")).unwrap();
    assert_eq!(record.status, PresenceStatus::Online);
    assert_eq!(store.guarantee_count(), 1);
}

#[tokio::test]
async fn test_retract_twice_is_the_same_as_once() {
    let store = MemoryPresenceStore::new();
    let publisher = publisher(&store);
    let session = identity("alice", "Alice").into_session(DEFAULT_DISPLAY_NAME);
    publisher.publish(&session).await.unwrap();

    let first = publisher.retract(&session).await.unwrap();
    let Retraction::Retracted(offline) = first else {
        panic!("expected the first retract to write Offline, got {first:?}");
    };
    let after_first = store.record(&publisher.key_for(&session)).unwrap();
    assert_eq!(after_first, offline);

    let second = publisher.retract(&session).await.unwrap();
    assert_eq!(second, Retraction::AlreadyOffline);
    assert_eq!(store.record(&publisher.key_for(&session)).unwrap(), after_first);
    assert_eq!(store.guarantee_count(), 0);
}

#[tokio::test]
async fn test_dropped_connection_fires_guarantee() {
    let store = MemoryPresenceStore::new();
    let connection = store.connect();
    let publisher = PresencePublisher::new(Arc::new(connection.clone()), KeyPrefix::default());
    let session = identity("alice", "Alice").into_session(DEFAULT_DISPLAY_NAME);
    let online = publisher.publish(&session).await.unwrap();

    assert_eq!(connection.disconnect(), 1);

    let record = store.record(&publisher.key_for(&session)).unwrap();
    assert_eq!(record.status, PresenceStatus::Offline);
    assert_eq!(record.display_name, "Alice");
    assert!(record.last_seen >= online.last_seen);
    assert_eq!(store.guarantee_count(), 0);
}

// ============================================================================
// Subscriber Tests
// ============================================================================

#[tokio::test]
async fn test_stop_discards_in_flight_notification() {
    let store = MemoryPresenceStore::new();
    let mut feed = subscriber(&store).start().await.unwrap();
    assert!(within(feed.next()).await.unwrap().unwrap().is_empty());

    // Delivered to the feed's buffer but not yet polled
    publisher(&store)
        .publish(&identity("bob", "Bob").into_session(DEFAULT_DISPLAY_NAME))
        .await
        .unwrap();

    feed.stop();
    assert!(feed.next().await.is_none());
    assert_eq!(store.subscription_count(), 0);
}

#[tokio::test]
async fn test_signed_out_client_stops_receiving_sets() {
    let store = MemoryPresenceStore::new();
    let alice = TestClient::connect(&store);
    let bob = TestClient::connect(&store);

    alice.sign_in("alice", "Alice");
    alice.sees(&["alice"]).await;
    alice.sign_out();
    alice.phase(LifecyclePhase::Idle).await;

    let mut emissions = alice.handle.view().subscribe();
    bob.sign_in("bob", "Bob");
    bob.sees(&["bob"]).await;

    let state = alice.handle.view().current();
    assert!(state.users.is_empty());
    assert_eq!(state.last_error, Some(PresenceError::AuthUnavailable));
    assert!(emissions.try_recv().is_err());
}

// ============================================================================
// Lifecycle Scenarios
// ============================================================================

#[tokio::test]
async fn test_two_clients_log_in_log_out_and_drop() {
    let store = MemoryPresenceStore::new();
    let mut observer = subscriber(&store).start().await.unwrap();
    let mut seen: Vec<Vec<String>> = Vec::new();

    advance_to(&mut observer, &mut seen, &[]).await;

    let a = TestClient::connect(&store);
    a.sign_in("alice", "Alice");
    a.sees(&["alice"]).await;
    advance_to(&mut observer, &mut seen, &["alice"]).await;

    let b = TestClient::connect(&store);
    b.sign_in("bob", "Bob");
    a.sees(&["alice", "bob"]).await;
    b.sees(&["alice", "bob"]).await;
    advance_to(&mut observer, &mut seen, &["alice", "bob"]).await;

    a.sign_out();
    b.sees(&["bob"]).await;
    advance_to(&mut observer, &mut seen, &["bob"]).await;
    assert_eq!(a.record("alice").unwrap().status, PresenceStatus::Offline);

    assert_eq!(b.drop_connection(), 1);
    advance_to(&mut observer, &mut seen, &[]).await;
    assert_eq!(b.record("bob").unwrap().status, PresenceStatus::Offline);

    assert_eq!(
        seen,
        vec![
            Vec::<String>::new(),
            vec!["alice".to_string()],
            vec!["alice".to_string(), "bob".to_string()],
            vec!["bob".to_string()],
            Vec::<String>::new(),
        ]
    );
}

#[tokio::test]
async fn test_identity_switch_during_in_flight_publish() {
    let store = MemoryPresenceStore::new();
    let client = TestClient::connect(&store);
    store.set_write_latency(Some(Duration::from_millis(100)));

    client.sign_in("alice", "Alice");
    client.phase(LifecyclePhase::Activating).await;
    client.sign_out();
    client.sign_in("bob", "Bob");

    client.sees(&["bob"]).await;
    client.phase(LifecyclePhase::Active).await;

    assert_eq!(store.guarantee_count(), 1);
    assert!(store.guarantee(&client.key("bob")).is_some());
    assert!(store.guarantee(&client.key("alice")).is_none());

    let alice = client.record("alice").unwrap();
    assert_eq!(alice.status, PresenceStatus::Offline);
    assert_eq!(client.record("bob").unwrap().status, PresenceStatus::Online);
}

#[tokio::test]
async fn test_display_name_falls_back_to_default() {
    let store = MemoryPresenceStore::new();
    let client = TestClient::connect(&store);
    client
        .identities
        .sign_in(presence_core::Identity::new(client_id("carol"), None));

    let state = client.sees(&["carol"]).await;
    assert_eq!(state.users[0].display_name, DEFAULT_DISPLAY_NAME);
}

#[tokio::test]
async fn test_shutdown_retracts_live_session() {
    let store = MemoryPresenceStore::new();
    let client = TestClient::connect(&store);
    client.sign_in("alice", "Alice");
    client.phase(LifecyclePhase::Active).await;

    within(client.handle.shutdown()).await;

    assert!(!client.handle.is_running());
    assert_eq!(client.record("alice").unwrap().status, PresenceStatus::Offline);
    assert_eq!(store.guarantee_count(), 0);
}
