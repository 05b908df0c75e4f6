//! Presence keys
//!
//! Records live under a common prefix, one key per client:
//! `<prefix>/<client id>` (e.g. `users/alice`).

use std::fmt;

use super::ClientId;

/// Separator between the key range prefix and the client id
pub const KEY_SEPARATOR: char = '/';

/// Key range holding all presence records
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Create a prefix, stripping surrounding separators
    pub fn new(prefix: impl Into<String>) -> Self {
        let raw: String = prefix.into();
        Self(raw.trim_matches(KEY_SEPARATOR).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the given client's record inside this range
    pub fn key(&self, client_id: &ClientId) -> PresenceKey {
        PresenceKey {
            prefix: self.clone(),
            client_id: client_id.clone(),
        }
    }

    /// Parse a full key back into a key of this range
    ///
    /// Returns `None` for keys outside the range or with an invalid id.
    pub fn parse_key(&self, full: &str) -> Option<PresenceKey> {
        let rest = full.strip_prefix(self.0.as_str())?;
        let id = rest.strip_prefix(KEY_SEPARATOR)?;
        ClientId::parse(id).ok().map(|client_id| self.key(&client_id))
    }

    /// Glob pattern matching every key of this range
    pub fn pattern(&self) -> String {
        format!("{}{KEY_SEPARATOR}*", self.0)
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self::new("users")
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full key of one client's presence record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresenceKey {
    prefix: KeyPrefix,
    client_id: ClientId,
}

impl PresenceKey {
    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Whether this key falls inside the given range
    pub fn is_in(&self, prefix: &KeyPrefix) -> bool {
        &self.prefix == prefix
    }
}

impl fmt::Display for PresenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.prefix, self.client_id)
    }
}
