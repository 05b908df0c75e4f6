//! Ports - interfaces the presence subsystem consumes
//!
//! The domain defines what it needs from the outside world; store back-ends
//! and identity providers implement these traits.

mod identity;
mod store;

pub use identity::{IdentityProvider, IdentityStream};
pub use store::{PresenceStore, SnapshotStream};
