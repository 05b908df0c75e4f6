//! Redis-backed presence store
//!
//! Records are JSON values under `<prefix>/<id>`. Every write publishes the
//! changed key on the range's change channel; subscribers reload the range on
//! each message and deliver a full snapshot.
//!
//! Redis has no notion of per-connection disconnect hooks, so guarantees are
//! emulated with leases: registering a guarantee stores the value under a
//! guard key and sets a lease key with a PX expiry. A background keepalive
//! refreshes the leases of this connection. If the process dies or loses the
//! network, the leases expire and [`GuaranteeReaper`](super::GuaranteeReaper)
//! applies the guard values.
//!
//! A guard whose lease has run out belongs to a dead session. Every write
//! first drops such a guard for its key, and the reaper only applies a guard
//! while both it and the record still hold what the reaper read. Both checks
//! run as Lua scripts, so a later session's record is never taken offline by
//! an earlier session's guarantee.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use presence_core::{
    KeyPrefix, PresenceKey, PresenceRecord, PresenceSnapshot, PresenceStore, SnapshotStream,
    StoreError, StoreResult,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{keys, receiver_stream};
use crate::pool::{RedisPool, RedisPoolError, RedisResult};

/// Delete a guard whose lease is gone
///
/// KEYS: lease, guard
static DROP_EXPIRED_GUARD: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return 0
        end
        return redis.call('DEL', KEYS[2])
        ",
    )
});

/// Write the guarded value unless the lease, the guard, or the record moved
/// on since they were read
///
/// KEYS: lease, guard, record. ARGV: guard as read, record as read (empty
/// when absent), record to write, change channel.
static APPLY_GUARD: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return 0
        end
        if redis.call('GET', KEYS[2]) ~= ARGV[1] then
            return 0
        end
        if (redis.call('GET', KEYS[3]) or '') ~= ARGV[2] then
            return 0
        end
        redis.call('DEL', KEYS[2])
        redis.call('SET', KEYS[3], ARGV[3])
        redis.call('PUBLISH', ARGV[4], KEYS[3])
        return 1
        ",
    )
});

/// Lease and scan settings for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Lifetime of a guarantee lease without a refresh
    pub lease: Duration,
    /// How often this connection refreshes its leases
    pub keepalive_interval: Duration,
    /// SCAN batch size when loading a key range
    pub scan_count: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(5),
            scan_count: 100,
        }
    }
}

impl From<&presence_common::StoreConfig> for RedisStoreConfig {
    fn from(config: &presence_common::StoreConfig) -> Self {
        Self {
            lease: config.guarantee_lease(),
            keepalive_interval: config.keepalive_interval(),
            ..Self::default()
        }
    }
}

/// One client connection to the Redis presence store
pub struct RedisPresenceStore {
    pool: RedisPool,
    pubsub: redis::Client,
    connection_id: String,
    config: RedisStoreConfig,
    leased: Arc<Mutex<HashSet<PresenceKey>>>,
    keepalive: JoinHandle<()>,
}

impl std::fmt::Debug for RedisPresenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPresenceStore")
            .field("connection_id", &self.connection_id)
            .field("leases", &self.leased.lock().len())
            .finish()
    }
}

impl RedisPresenceStore {
    /// Open a connection and start its lease keepalive
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(pool: RedisPool, config: RedisStoreConfig) -> RedisResult<Self> {
        let pubsub = pool.pubsub_client()?;
        let connection_id = Uuid::new_v4().to_string();
        let leased = Arc::new(Mutex::new(HashSet::new()));
        let keepalive = tokio::spawn(keepalive_loop(
            pool.clone(),
            Arc::clone(&leased),
            config.lease,
            config.keepalive_interval,
        ));

        info!(
            connection = %connection_id,
            lease_ms = config.lease.as_millis() as u64,
            "Redis presence connection opened"
        );

        Ok(Self {
            pool,
            pubsub,
            connection_id,
            config,
            leased,
            keepalive,
        })
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

impl Drop for RedisPresenceStore {
    fn drop(&mut self) {
        // Leases now run out and the reaper applies the guarantees
        self.keepalive.abort();
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn write(&self, key: &PresenceKey, record: &PresenceRecord) -> StoreResult<()> {
        drop_expired_guard(&self.pool, key).await?;
        write_record(&self.pool, key, record.clone()).await?;
        debug!(key = %key, status = %record.status, "Record written");
        Ok(())
    }

    async fn register_disconnect_guarantee(
        &self,
        key: &PresenceKey,
        value: &PresenceRecord,
    ) -> StoreResult<()> {
        // Lease before guard, or the reaper could fire a fresh guarantee
        self.pool
            .set_raw_px(&keys::lease_key(key), &self.connection_id, self.config.lease)
            .await?;
        self.pool.put_json(&keys::guard_key(key), value).await?;
        self.leased.lock().insert(key.clone());
        debug!(key = %key, "Disconnect guarantee registered");
        Ok(())
    }

    async fn cancel_guarantee(&self, key: &PresenceKey) -> StoreResult<Option<PresenceRecord>> {
        self.leased.lock().remove(key);
        let value: Option<PresenceRecord> = self.pool.take_json(&keys::guard_key(key)).await?;
        self.pool.delete(&keys::lease_key(key)).await?;
        Ok(value)
    }

    async fn subscribe(&self, prefix: &KeyPrefix) -> StoreResult<SnapshotStream> {
        let mut pubsub = self
            .pubsub
            .get_async_pubsub()
            .await
            .map_err(RedisPoolError::from)?;
        pubsub
            .subscribe(keys::changes_channel(prefix))
            .await
            .map_err(RedisPoolError::from)?;

        // Subscribed before loading, so no change between the two is missed
        let initial = load_snapshot(&self.pool, prefix, self.config.scan_count).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(initial));
        tokio::spawn(forward_changes(
            pubsub,
            tx,
            self.pool.clone(),
            prefix.clone(),
            self.config.scan_count,
        ));

        Ok(receiver_stream(rx))
    }
}

/// Write a record, keeping `last_seen` monotonic, and announce the change
pub(crate) async fn write_record(
    pool: &RedisPool,
    key: &PresenceKey,
    mut record: PresenceRecord,
) -> RedisResult<()> {
    let raw_key = keys::record_key(key);
    let previous: Option<PresenceRecord> = pool.get_json(&raw_key).await?;
    record.advance_from(previous.as_ref());
    pool.put_json(&raw_key, &record).await?;
    pool.publish(&keys::changes_channel(key.prefix()), &raw_key)
        .await?;
    Ok(())
}

/// Remove a guarantee left behind by a connection whose lease ran out
pub(crate) async fn drop_expired_guard(pool: &RedisPool, key: &PresenceKey) -> RedisResult<bool> {
    let (lease, guard) = (keys::lease_key(key), keys::guard_key(key));
    let dropped: i64 = pool
        .run_script(&DROP_EXPIRED_GUARD, &[lease.as_str(), guard.as_str()], &[])
        .await?;
    if dropped > 0 {
        debug!(key = %key, "Superseded an expired disconnect guarantee");
    }
    Ok(dropped > 0)
}

/// Apply the guarantee stored under `guard` if its lease is gone
///
/// Returns `false` when the guarantee was cancelled, taken by another reaper,
/// renewed, or the record changed after it was read.
pub(crate) async fn apply_guarantee(
    pool: &RedisPool,
    key: &PresenceKey,
    guard: &str,
) -> RedisResult<bool> {
    let Some(guarded) = pool.get_raw(guard).await? else {
        return Ok(false);
    };
    let value: PresenceRecord = serde_json::from_str(&guarded)?;

    let raw_key = keys::record_key(key);
    let current = pool.get_raw(&raw_key).await?;
    // A malformed record is overwritten like a missing one
    let previous = current
        .as_deref()
        .and_then(|raw| serde_json::from_str::<PresenceRecord>(raw).ok());

    let mut offline = value.seen_at(Utc::now());
    offline.advance_from(previous.as_ref());
    let encoded = serde_json::to_string(&offline)?;

    let lease = keys::lease_key(key);
    let channel = keys::changes_channel(key.prefix());
    let applied: i64 = pool
        .run_script(
            &APPLY_GUARD,
            &[lease.as_str(), guard, raw_key.as_str()],
            &[
                guarded.as_str(),
                current.as_deref().unwrap_or_default(),
                encoded.as_str(),
                channel.as_str(),
            ],
        )
        .await?;
    Ok(applied == 1)
}

/// Load every record of a key range
pub(crate) async fn load_snapshot(
    pool: &RedisPool,
    prefix: &KeyPrefix,
    scan_count: usize,
) -> RedisResult<PresenceSnapshot> {
    let raw_keys: Vec<String> = pool
        .scan_keys(&prefix.pattern(), scan_count)
        .await?
        .into_iter()
        .filter(|raw| prefix.parse_key(raw).is_some())
        .collect();
    let values = pool.get_raw_many(&raw_keys).await?;

    let records = raw_keys
        .iter()
        .zip(values)
        .filter_map(|(raw_key, value)| {
            // Deleted between SCAN and MGET
            let raw = value?;
            match serde_json::from_str::<PresenceRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %raw_key, error = %e, "Skipping malformed presence record");
                    None
                }
            }
        });

    Ok(PresenceSnapshot::from_records(records))
}

async fn forward_changes(
    mut pubsub: redis::aio::PubSub,
    tx: mpsc::UnboundedSender<StoreResult<PresenceSnapshot>>,
    pool: RedisPool,
    prefix: KeyPrefix,
    scan_count: usize,
) {
    let mut messages = pubsub.on_message();

    loop {
        tokio::select! {
            () = tx.closed() => break,
            message = messages.next() => {
                if message.is_none() {
                    warn!(prefix = %prefix, "Presence change channel closed");
                    let _ = tx.send(Err(StoreError::Disconnected));
                    break;
                }

                let snapshot = load_snapshot(&pool, &prefix, scan_count)
                    .await
                    .map_err(StoreError::from);
                let failed = snapshot.is_err();
                if tx.send(snapshot).is_err() || failed {
                    break;
                }
            }
        }
    }

    debug!(prefix = %prefix, "Presence change forwarder stopped");
}

async fn keepalive_loop(
    pool: RedisPool,
    leased: Arc<Mutex<HashSet<PresenceKey>>>,
    lease: Duration,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let current: Vec<PresenceKey> = leased.lock().iter().cloned().collect();

        for key in current {
            match pool.pexpire(&keys::lease_key(&key), lease).await {
                Ok(true) => {}
                Ok(false) => {
                    // Cancelled concurrently, or already reaped
                    if leased.lock().remove(&key) {
                        warn!(key = %key, "Guarantee lease expired before refresh");
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "Failed to refresh guarantee lease"),
            }
        }
    }
}
