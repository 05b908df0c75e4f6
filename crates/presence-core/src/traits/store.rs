//! Presence store port

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::entities::{PresenceRecord, PresenceSnapshot};
use crate::error::StoreResult;
use crate::value_objects::{KeyPrefix, PresenceKey};

/// Stream of full key-range snapshots, one per store change
///
/// Dropping the stream ends the subscription.
pub type SnapshotStream = BoxStream<'static, StoreResult<PresenceSnapshot>>;

/// Shared realtime key-value store holding presence records
///
/// One value implements one client connection to the store: disconnect
/// guarantees registered through it belong to that connection and are applied
/// by the store when the connection drops.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Write `record` at `key`, replacing the previous record
    async fn write(&self, key: &PresenceKey, record: &PresenceRecord) -> StoreResult<()>;

    /// Ask the store to write `value` at `key` when this connection drops
    ///
    /// Replaces any guarantee already registered for `key`. The store stamps
    /// `last_seen` with the time of disconnect when it applies the value.
    async fn register_disconnect_guarantee(
        &self,
        key: &PresenceKey,
        value: &PresenceRecord,
    ) -> StoreResult<()>;

    /// Release the guarantee for `key`
    ///
    /// Returns the value that would have been written, or `None` if no
    /// guarantee was registered (never registered, already cancelled, or
    /// already applied by the store).
    async fn cancel_guarantee(&self, key: &PresenceKey) -> StoreResult<Option<PresenceRecord>>;

    /// Subscribe to the whole key range
    ///
    /// The current snapshot is delivered first, then one snapshot per change.
    async fn subscribe(&self, prefix: &KeyPrefix) -> StoreResult<SnapshotStream>;
}
