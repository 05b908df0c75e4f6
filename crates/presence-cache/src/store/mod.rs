//! Presence store implementations

pub mod keys;
mod memory;
mod reaper;
mod redis_store;

pub use memory::{ConnectionId, MemoryConnection, MemoryPresenceStore};
pub use reaper::GuaranteeReaper;
pub use redis_store::{RedisPresenceStore, RedisStoreConfig};

use presence_core::{SnapshotStream, StoreError, StoreResult};
use tokio::sync::mpsc;

use crate::pool::RedisPoolError;

impl From<RedisPoolError> for StoreError {
    fn from(err: RedisPoolError) -> Self {
        if err.is_connection_loss() {
            return StoreError::Disconnected;
        }
        match err {
            RedisPoolError::Serialization(e) => StoreError::from(e),
            other => StoreError::backend(other),
        }
    }
}

/// Adapt a channel receiver into a boxed snapshot stream
pub(crate) fn receiver_stream(
    rx: mpsc::UnboundedReceiver<StoreResult<presence_core::PresenceSnapshot>>,
) -> SnapshotStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
