//! Store snapshots and the derived online set

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::presence::PresenceRecord;
use crate::value_objects::ClientId;

/// Full contents of the presence key range at one notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    records: BTreeMap<ClientId, PresenceRecord>,
}

impl PresenceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; a later record for the same id replaces an earlier one
    pub fn from_records(records: impl IntoIterator<Item = PresenceRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn get(&self, id: &ClientId) -> Option<&PresenceRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by client id
    pub fn records(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.values()
    }

    /// Recompute the online set from this snapshot
    pub fn online_set(&self) -> OnlineSet {
        OnlineSet::from_snapshot(self)
    }
}

/// Consumer-facing entry of the online set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub id: ClientId,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// All records with status Online, ordered by client id
///
/// Always rebuilt from a full snapshot, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnlineSet {
    users: Vec<OnlineUser>,
}

impl OnlineSet {
    pub fn from_snapshot(snapshot: &PresenceSnapshot) -> Self {
        Self {
            users: snapshot
                .records()
                .filter(|r| r.is_online())
                .map(PresenceRecord::to_online_user)
                .collect(),
        }
    }

    pub fn users(&self) -> &[OnlineUser] {
        &self.users
    }

    pub fn into_users(self) -> Vec<OnlineUser> {
        self.users
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.users.iter().any(|u| &u.id == id)
    }

    /// Client ids in order, handy for assertions and logging
    pub fn ids(&self) -> Vec<&str> {
        self.users.iter().map(|u| u.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
