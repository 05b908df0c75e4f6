//! Redis key layout for presence data
//!
//! | Key                          | Value                                     |
//! |------------------------------|-------------------------------------------|
//! | `<prefix>/<id>`              | JSON presence record                      |
//! | `presence_guard:<prefix>/<id>` | JSON record to apply on disconnect      |
//! | `presence_lease:<prefix>/<id>` | owner connection id, expires with PX    |
//! | `presence_changes:<prefix>`  | pub/sub channel carrying changed keys     |

use presence_core::{KeyPrefix, PresenceKey};

const GUARD_PREFIX: &str = "presence_guard:";
const LEASE_PREFIX: &str = "presence_lease:";
const CHANGES_PREFIX: &str = "presence_changes:";

/// Key holding the record itself
pub fn record_key(key: &PresenceKey) -> String {
    key.to_string()
}

/// Key holding the pending disconnect guarantee
pub fn guard_key(key: &PresenceKey) -> String {
    format!("{GUARD_PREFIX}{key}")
}

/// Key whose expiry signals that the owning connection is gone
pub fn lease_key(key: &PresenceKey) -> String {
    format!("{LEASE_PREFIX}{key}")
}

/// Pattern matching every guarantee in a key range
pub fn guard_pattern(prefix: &KeyPrefix) -> String {
    format!("{GUARD_PREFIX}{}", prefix.pattern())
}

/// Channel announcing changes in a key range
pub fn changes_channel(prefix: &KeyPrefix) -> String {
    format!("{CHANGES_PREFIX}{prefix}")
}

/// Recover the presence key from a guarantee key
pub fn key_from_guard(prefix: &KeyPrefix, guard: &str) -> Option<PresenceKey> {
    guard
        .strip_prefix(GUARD_PREFIX)
        .and_then(|rest| prefix.parse_key(rest))
}
