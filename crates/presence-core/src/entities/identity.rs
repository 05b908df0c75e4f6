//! Identities and sessions
//!
//! An [`Identity`] is what the identity provider reports; a [`Session`] is the
//! identity resolved for one lifecycle epoch (display name filled in).

use serde::{Deserialize, Serialize};

use crate::value_objects::ClientId;

/// Display name used when the identity provider has none
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous User";

/// Authenticated identity as delivered by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub client_id: ClientId,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(client_id: ClientId, display_name: Option<String>) -> Self {
        Self {
            client_id,
            display_name,
        }
    }

    /// Resolve into a session, falling back to `default_name` for a missing
    /// or blank display name
    #[must_use]
    pub fn into_session(self, default_name: &str) -> Session {
        let display_name = self
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_name.to_string());

        Session {
            client_id: self.client_id,
            display_name,
        }
    }
}

/// The currently authenticated identity for one lifecycle epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    client_id: ClientId,
    display_name: String,
}

impl Session {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether both sessions belong to the same client
    pub fn same_client(&self, other: &Session) -> bool {
        self.client_id == other.client_id
    }
}
