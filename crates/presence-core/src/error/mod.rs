//! Error types for the presence domain

mod presence_error;
mod store_error;

pub use presence_error::{PresenceError, PresenceResult};
pub use store_error::{StoreError, StoreResult};
