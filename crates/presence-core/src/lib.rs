//! # presence-core
//!
//! Domain layer for online presence tracking: client identifiers, presence
//! records, sessions, lifecycle epochs, and the ports (traits) implemented by
//! presence stores and identity providers.
//! This crate has zero dependencies on infrastructure (Redis, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Identity, OnlineSet, OnlineUser, PresenceRecord, PresenceSnapshot, PresenceStatus, Session,
    DEFAULT_DISPLAY_NAME,
};
pub use error::{PresenceError, PresenceResult, StoreError, StoreResult};
pub use events::SessionEvent;
pub use traits::{IdentityProvider, IdentityStream, PresenceStore, SnapshotStream};
pub use value_objects::{
    ClientId, ClientIdParseError, Epoch, EpochCounter, KeyPrefix, PresenceKey,
};
