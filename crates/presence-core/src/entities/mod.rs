//! Domain entities - presence records, sessions, and derived views

mod identity;
mod online_set;
mod presence;

pub use identity::{Identity, Session, DEFAULT_DISPLAY_NAME};
pub use online_set::{OnlineSet, OnlineUser, PresenceSnapshot};
pub use presence::{PresenceRecord, PresenceStatus};
