//! Presence record entity - one client's online/offline status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Session;
use super::online_set::OnlineUser;
use crate::value_objects::ClientId;

/// Client online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Client has a live session
    Online,
    /// Client logged out or lost its connection
    #[default]
    Offline,
}

impl PresenceStatus {
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// Presence record stored at `<prefix>/<id>`
///
/// Serialized as `{"id", "name", "status", "lastSeen"}` with `lastSeen` in
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub id: ClientId,
    #[serde(rename = "name")]
    pub display_name: String,
    pub status: PresenceStatus,
    #[serde(rename = "lastSeen", with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    /// Online record for a session
    #[must_use]
    pub fn online(session: &Session, at: DateTime<Utc>) -> Self {
        Self {
            id: session.client_id().clone(),
            display_name: session.display_name().to_string(),
            status: PresenceStatus::Online,
            last_seen: at,
        }
    }

    /// Offline copy of this record, seen at `at` (never earlier than the
    /// current `last_seen`)
    #[must_use]
    pub fn to_offline(&self, at: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            status: PresenceStatus::Offline,
            last_seen: self.last_seen.max(at),
        }
    }

    /// Copy with `last_seen` moved forward to `at`
    #[must_use]
    pub fn seen_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_seen: self.last_seen.max(at),
            ..self.clone()
        }
    }

    /// Keep `last_seen` non-decreasing relative to the record being replaced
    pub fn advance_from(&mut self, previous: Option<&PresenceRecord>) {
        if let Some(previous) = previous {
            if previous.last_seen > self.last_seen {
                self.last_seen = previous.last_seen;
            }
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    /// Consumer-facing projection
    #[must_use]
    pub fn to_online_user(&self) -> OnlineUser {
        OnlineUser {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}
