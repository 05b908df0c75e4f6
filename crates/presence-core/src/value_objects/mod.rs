//! Value objects - immutable types that represent domain concepts

mod client_id;
mod epoch;
mod key;

pub use client_id::{ClientId, ClientIdParseError};
pub use epoch::{Epoch, EpochCounter};
pub use key::{KeyPrefix, PresenceKey};
