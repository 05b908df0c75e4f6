//! # presence-cache
//!
//! Presence store back-ends implementing [`presence_core::PresenceStore`].
//!
//! ## Features
//!
//! - **Memory store**: in-process realtime store with connections, disconnect
//!   guarantees, and snapshot subscriptions (single process, tests, demos)
//! - **Connection Pool**: managed Redis connection pool with deadpool
//! - **Redis store**: shared store with pub/sub change notifications and
//!   lease-backed disconnect guarantees
//! - **Guarantee reaper**: store-side task applying guarantees whose lease expired
//!
//! ## Example
//!
//! ```ignore
//! use presence_cache::MemoryPresenceStore;
//! use presence_core::{KeyPrefix, PresenceStore};
//!
//! let store = MemoryPresenceStore::new();
//! let connection = store.connect();
//! let mut snapshots = connection.subscribe(&KeyPrefix::default()).await?;
//!
//! // Simulate hard network loss: the store applies every guarantee
//! store.disconnect(connection.id());
//! ```

pub mod pool;
pub mod store;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export store types
pub use store::{
    ConnectionId, GuaranteeReaper, MemoryConnection, MemoryPresenceStore, RedisPresenceStore,
    RedisStoreConfig,
};
