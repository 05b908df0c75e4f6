//! Redis Store Integration Tests
//!
//! These tests require:
//! - Running Redis instance
//! - Environment variable: REDIS_URL
//!
//! Every test works under its own key prefix so runs can share one server.
//!
//! Run with: cargo test -p integration-tests --test redis_tests

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use integration_tests::{
    check_redis_env, identity, redis_url, unique_client_id, unique_prefix, within,
};
use presence_cache::store::keys;
use presence_cache::{GuaranteeReaper, RedisPool, RedisPoolConfig, RedisPresenceStore, RedisStoreConfig};
use presence_core::{
    Identity, KeyPrefix, PresenceRecord, PresenceSnapshot, PresenceStatus, PresenceStore,
    DEFAULT_DISPLAY_NAME,
};
use presence_service::{PresencePublisher, PresenceSubscriber, Retraction};

fn pool() -> RedisPool {
    RedisPool::new(RedisPoolConfig {
        url: redis_url().expect("REDIS_URL not set"),
        max_connections: 4,
    })
    .expect("Failed to create pool")
}

/// Short leases so an abandoned connection expires within the test
fn short_lease() -> RedisStoreConfig {
    RedisStoreConfig {
        lease: Duration::from_millis(300),
        keepalive_interval: Duration::from_millis(100),
        ..RedisStoreConfig::default()
    }
}

fn connect(pool: &RedisPool, config: RedisStoreConfig) -> Arc<RedisPresenceStore> {
    Arc::new(RedisPresenceStore::connect(pool.clone(), config).expect("Failed to connect store"))
}

/// Current contents of `prefix`, read through a fresh subscription
async fn snapshot(store: &RedisPresenceStore, prefix: &KeyPrefix) -> PresenceSnapshot {
    let mut stream = store.subscribe(prefix).await.expect("subscribe failed");
    within(stream.next()).await.unwrap().unwrap()
}

// ============================================================================
// Publisher Tests
// ============================================================================

#[tokio::test]
async fn test_publish_then_retract() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let store = connect(&pool, RedisStoreConfig::default());
    let publisher = PresencePublisher::new(store.clone(), prefix.clone());
    let session = Identity::new(unique_client_id("alice"), Some("Alice".to_string()))
        .into_session(DEFAULT_DISPLAY_NAME);

    let online = publisher.publish(&session).await.unwrap();
    let current = snapshot(&store, &prefix).await;
    assert_eq!(current.get(session.client_id()), Some(&online));

    let Retraction::Retracted(offline) = publisher.retract(&session).await.unwrap() else {
        panic!("expected a pending guarantee");
    };
    assert_eq!(offline.status, PresenceStatus::Offline);
    assert!(offline.last_seen >= online.last_seen);

    assert_eq!(publisher.retract(&session).await.unwrap(), Retraction::AlreadyOffline);
    let current = snapshot(&store, &prefix).await;
    assert_eq!(current.get(session.client_id()), Some(&offline));
}

#[tokio::test]
async fn test_cancel_only_returns_pending_guarantee_once() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let store = connect(&pool, RedisStoreConfig::default());
    let session = Identity::new(unique_client_id("bob"), None).into_session(DEFAULT_DISPLAY_NAME);
    let key = prefix.key(session.client_id());
    let value = presence_core::PresenceRecord::online(&session, chrono::Utc::now())
        .to_offline(chrono::Utc::now());

    store.register_disconnect_guarantee(&key, &value).await.unwrap();
    assert_eq!(store.cancel_guarantee(&key).await.unwrap(), Some(value));
    assert_eq!(store.cancel_guarantee(&key).await.unwrap(), None);
}

// ============================================================================
// Subscriber Tests
// ============================================================================

#[tokio::test]
async fn test_feed_follows_other_connections() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let watcher = connect(&pool, RedisStoreConfig::default());
    let writer = connect(&pool, RedisStoreConfig::default());

    let mut feed = PresenceSubscriber::new(watcher, prefix.clone()).start().await.unwrap();
    assert!(within(feed.next()).await.unwrap().unwrap().is_empty());

    let session = Identity::new(unique_client_id("carol"), Some("Carol".to_string()))
        .into_session(DEFAULT_DISPLAY_NAME);
    PresencePublisher::new(writer, prefix).publish(&session).await.unwrap();

    let set = within(feed.next()).await.unwrap().unwrap();
    assert!(set.contains(session.client_id()));
    assert_eq!(set.users()[0].display_name, "Carol");

    feed.stop();
    assert!(feed.next().await.is_none());
}

// ============================================================================
// Guarantee Reaper Tests
// ============================================================================

#[tokio::test]
async fn test_reaper_applies_guarantee_after_lease_expires() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let session = identity("dave", "Dave").into_session(DEFAULT_DISPLAY_NAME);
    let reaper = GuaranteeReaper::new(pool.clone(), prefix.clone(), Duration::from_millis(100));

    let doomed = connect(&pool, short_lease());
    PresencePublisher::new(doomed.clone(), prefix.clone())
        .publish(&session)
        .await
        .unwrap();

    // Lease is still being refreshed
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(reaper.sweep().await.unwrap(), 0);

    // Losing the connection stops the keepalive
    drop(doomed);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(reaper.sweep().await.unwrap(), 1);
    assert_eq!(reaper.sweep().await.unwrap(), 0);

    let observer = connect(&pool, RedisStoreConfig::default());
    let record = snapshot(&observer, &prefix)
        .await
        .get(session.client_id())
        .cloned()
        .unwrap();
    assert_eq!(record.status, PresenceStatus::Offline);
    assert_eq!(record.display_name, "Dave");
}

#[tokio::test]
async fn test_reaper_skips_retracted_sessions() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let store = connect(&pool, short_lease());
    let publisher = PresencePublisher::new(store.clone(), prefix.clone());
    let session = identity("erin", "Erin").into_session(DEFAULT_DISPLAY_NAME);

    publisher.publish(&session).await.unwrap();
    publisher.retract(&session).await.unwrap();
    drop(publisher);
    drop(store);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let reaper = GuaranteeReaper::new(pool, prefix, Duration::from_millis(100));
    assert_eq!(reaper.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reaper_leaves_successor_session_online() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let session = identity("frank", "Frank").into_session(DEFAULT_DISPLAY_NAME);
    let key = prefix.key(session.client_id());
    let reaper = GuaranteeReaper::new(pool.clone(), prefix.clone(), Duration::from_millis(100));

    // First session dies; its lease runs out before any sweep
    let doomed = connect(&pool, short_lease());
    PresencePublisher::new(doomed.clone(), prefix.clone())
        .publish(&session)
        .await
        .unwrap();
    drop(doomed);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(pool.exists(&keys::guard_key(&key)).await.unwrap());

    // Same client comes back and writes Online, guarantee not yet registered
    let successor = connect(&pool, RedisStoreConfig::default());
    let online = PresenceRecord::online(&session, chrono::Utc::now());
    successor.write(&key, &online).await.unwrap();

    assert_eq!(reaper.sweep().await.unwrap(), 0);
    assert!(!pool.exists(&keys::guard_key(&key)).await.unwrap());
    let record = snapshot(&successor, &prefix)
        .await
        .get(session.client_id())
        .cloned()
        .unwrap();
    assert_eq!(record.status, PresenceStatus::Online);
    assert!(record.last_seen >= online.last_seen);
}

#[tokio::test]
async fn test_reaper_drops_malformed_guarantee() {
    if !check_redis_env() {
        return;
    }

    let pool = pool();
    let prefix = unique_prefix();
    let guard = keys::guard_key(&prefix.key(&unique_client_id("grace")));
    pool.put_json(&guard, &"not a record").await.unwrap();

    let reaper = GuaranteeReaper::new(pool.clone(), prefix, Duration::from_millis(100));
    assert_eq!(reaper.sweep().await.unwrap(), 0);
    assert!(!pool.exists(&guard).await.unwrap());
}
