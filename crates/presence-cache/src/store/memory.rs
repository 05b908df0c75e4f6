//! In-process realtime store
//!
//! [`MemoryPresenceStore`] is the shared store; each [`MemoryConnection`] is
//! one client connection to it. Dropping a connection with
//! [`MemoryPresenceStore::disconnect`] applies every disconnect guarantee the
//! connection registered, the way a hosted realtime database does when a
//! client's socket goes away.
//!
//! All mutations and notifications happen under one lock, so subscribers see
//! snapshots in write order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use presence_core::{
    KeyPrefix, PresenceKey, PresenceRecord, PresenceSnapshot, PresenceStore, SnapshotStream,
    StoreError, StoreResult,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::receiver_stream;

/// Identifier of one client connection to the memory store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type SnapshotSender = mpsc::UnboundedSender<StoreResult<PresenceSnapshot>>;

struct Guarantee {
    owner: ConnectionId,
    value: PresenceRecord,
}

struct Subscription {
    owner: ConnectionId,
    prefix: KeyPrefix,
    tx: SnapshotSender,
}

/// Injected failures and delays
#[derive(Default)]
struct Faults {
    write_latency: Option<Duration>,
    subscribe_latency: Option<Duration>,
    failing_writes: usize,
    failing_guarantees: usize,
    reject_subscriptions: bool,
}

#[derive(Default)]
struct State {
    records: HashMap<PresenceKey, PresenceRecord>,
    guarantees: HashMap<PresenceKey, Guarantee>,
    subscriptions: Vec<Subscription>,
    live: HashSet<ConnectionId>,
    next_connection: u64,
    faults: Faults,
}

impl State {
    fn ensure_live(&self, id: ConnectionId) -> StoreResult<()> {
        if self.live.contains(&id) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    fn snapshot(&self, prefix: &KeyPrefix) -> PresenceSnapshot {
        PresenceSnapshot::from_records(
            self.records
                .iter()
                .filter(|(key, _)| key.is_in(prefix))
                .map(|(_, record)| record.clone()),
        )
    }

    /// Replace the record at `key` and notify the key range
    fn apply(&mut self, key: &PresenceKey, mut record: PresenceRecord) {
        record.advance_from(self.records.get(key));
        self.records.insert(key.clone(), record);
        self.notify(key.prefix());
    }

    fn notify(&mut self, prefix: &KeyPrefix) {
        let snapshot = self.snapshot(prefix);
        // Closed receivers are pruned here
        self.subscriptions
            .retain(|sub| sub.prefix != *prefix || sub.tx.send(Ok(snapshot.clone())).is_ok());
    }
}

/// Shared in-memory presence store
#[derive(Clone, Default)]
pub struct MemoryPresenceStore {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for MemoryPresenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryPresenceStore")
            .field("records", &state.records.len())
            .field("guarantees", &state.guarantees.len())
            .field("connections", &state.live.len())
            .finish()
    }
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new client connection
    pub fn connect(&self) -> MemoryConnection {
        let mut state = self.state.lock();
        state.next_connection += 1;
        let id = ConnectionId(state.next_connection);
        state.live.insert(id);
        debug!(connection = %id, "Memory store connection opened");

        MemoryConnection {
            id,
            store: self.clone(),
        }
    }

    /// Drop a connection: apply its guarantees and fail its subscriptions
    ///
    /// Guarantee values are stamped with the time of disconnect. Returns the
    /// number of guarantees applied.
    pub fn disconnect(&self, id: ConnectionId) -> usize {
        let mut state = self.state.lock();
        if !state.live.remove(&id) {
            return 0;
        }

        let now = Utc::now();
        let owned: Vec<PresenceKey> = state
            .guarantees
            .iter()
            .filter(|(_, guarantee)| guarantee.owner == id)
            .map(|(key, _)| key.clone())
            .collect();

        let mut fired = 0;
        for key in owned {
            if let Some(guarantee) = state.guarantees.remove(&key) {
                state.apply(&key, guarantee.value.seen_at(now));
                fired += 1;
            }
        }

        state.subscriptions.retain(|sub| {
            if sub.owner == id {
                let _ = sub.tx.send(Err(StoreError::Disconnected));
                false
            } else {
                true
            }
        });

        info!(connection = %id, fired, "Connection dropped, disconnect guarantees applied");
        fired
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.state.lock().live.contains(&id)
    }

    /// Write a record directly, as a writer outside any connection would
    pub fn insert(&self, key: &PresenceKey, record: PresenceRecord) {
        self.state.lock().apply(key, record);
    }

    pub fn record(&self, key: &PresenceKey) -> Option<PresenceRecord> {
        self.state.lock().records.get(key).cloned()
    }

    /// Current contents of a key range
    pub fn snapshot(&self, prefix: &KeyPrefix) -> PresenceSnapshot {
        self.state.lock().snapshot(prefix)
    }

    /// Value a pending guarantee would write
    pub fn guarantee(&self, key: &PresenceKey) -> Option<PresenceRecord> {
        self.state
            .lock()
            .guarantees
            .get(key)
            .map(|guarantee| guarantee.value.clone())
    }

    pub fn guarantee_count(&self) -> usize {
        self.state.lock().guarantees.len()
    }

    /// Number of subscriptions whose receiver is still alive
    pub fn subscription_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscriptions.retain(|sub| !sub.tx.is_closed());
        state.subscriptions.len()
    }

    /// Delay every subsequent write by `latency`
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        self.state.lock().faults.write_latency = latency;
    }

    /// Delay every subsequent subscription start by `latency`
    pub fn set_subscribe_latency(&self, latency: Option<Duration>) {
        self.state.lock().faults.subscribe_latency = latency;
    }

    /// Fail the next `count` record writes
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().faults.failing_writes = count;
    }

    /// Fail the next `count` guarantee registrations
    pub fn fail_next_guarantees(&self, count: usize) {
        self.state.lock().faults.failing_guarantees = count;
    }

    /// Refuse new subscriptions, as a store denying read access would
    pub fn reject_subscriptions(&self, reject: bool) {
        self.state.lock().faults.reject_subscriptions = reject;
    }

    /// Break every open subscription with `error`
    pub fn fail_subscriptions(&self, error: StoreError) -> usize {
        let mut state = self.state.lock();
        let broken = state.subscriptions.len();
        for sub in state.subscriptions.drain(..) {
            let _ = sub.tx.send(Err(error.clone()));
        }
        broken
    }
}

/// One client connection to a [`MemoryPresenceStore`]
#[derive(Clone)]
pub struct MemoryConnection {
    id: ConnectionId,
    store: MemoryPresenceStore,
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .finish()
    }
}

impl MemoryConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn store(&self) -> &MemoryPresenceStore {
        &self.store
    }

    /// Simulate losing this connection
    pub fn disconnect(&self) -> usize {
        self.store.disconnect(self.id)
    }
}

#[async_trait]
impl PresenceStore for MemoryConnection {
    async fn write(&self, key: &PresenceKey, record: &PresenceRecord) -> StoreResult<()> {
        let latency = {
            let state = self.store.state.lock();
            state.ensure_live(self.id)?;
            state.faults.write_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.store.state.lock();
        state.ensure_live(self.id)?;
        if state.faults.failing_writes > 0 {
            state.faults.failing_writes -= 1;
            return Err(StoreError::backend("injected write failure"));
        }
        state.apply(key, record.clone());
        debug!(connection = %self.id, key = %key, status = %record.status, "Record written");
        Ok(())
    }

    async fn register_disconnect_guarantee(
        &self,
        key: &PresenceKey,
        value: &PresenceRecord,
    ) -> StoreResult<()> {
        let mut state = self.store.state.lock();
        state.ensure_live(self.id)?;
        if state.faults.failing_guarantees > 0 {
            state.faults.failing_guarantees -= 1;
            return Err(StoreError::backend("injected guarantee failure"));
        }
        state.guarantees.insert(
            key.clone(),
            Guarantee {
                owner: self.id,
                value: value.clone(),
            },
        );
        debug!(connection = %self.id, key = %key, "Disconnect guarantee registered");
        Ok(())
    }

    async fn cancel_guarantee(&self, key: &PresenceKey) -> StoreResult<Option<PresenceRecord>> {
        let mut state = self.store.state.lock();
        // A lost connection's guarantees fired when it dropped
        if !state.live.contains(&self.id) {
            return Ok(None);
        }
        let owned = state
            .guarantees
            .get(key)
            .is_some_and(|guarantee| guarantee.owner == self.id);
        if !owned {
            return Ok(None);
        }
        Ok(state.guarantees.remove(key).map(|guarantee| guarantee.value))
    }

    async fn subscribe(&self, prefix: &KeyPrefix) -> StoreResult<SnapshotStream> {
        let latency = {
            let state = self.store.state.lock();
            state.ensure_live(self.id)?;
            state.faults.subscribe_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.store.state.lock();
        state.ensure_live(self.id)?;
        if state.faults.reject_subscriptions {
            return Err(StoreError::backend("permission denied"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, the send cannot fail
        let _ = tx.send(Ok(state.snapshot(prefix)));
        state.subscriptions.push(Subscription {
            owner: self.id,
            prefix: prefix.clone(),
            tx,
        });
        Ok(receiver_stream(rx))
    }
}
