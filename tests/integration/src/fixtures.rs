//! Test fixtures and data generators
//!
//! Provides simulated presence clients sharing one in-memory store, and the
//! request/response shapes of the agent API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use presence_cache::{MemoryConnection, MemoryPresenceStore};
use presence_core::{ClientId, Identity, KeyPrefix, PresenceKey, PresenceRecord};
use presence_service::{
    CoordinatorConfig, CoordinatorHandle, LifecycleCoordinator, LifecyclePhase,
    LocalIdentityProvider, OnlineUsersState,
};
use serde::{Deserialize, Serialize};

use crate::helpers::within;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Client id that no other test uses
pub fn unique_client_id(base: &str) -> ClientId {
    ClientId::parse(&format!("{base}-{}", unique_suffix())).unwrap()
}

/// Key prefix that no other test uses, for stores shared across tests
pub fn unique_prefix() -> KeyPrefix {
    KeyPrefix::new(format!("test-presence-{}", uuid::Uuid::new_v4().simple()))
}

pub fn client_id(id: &str) -> ClientId {
    ClientId::parse(id).unwrap()
}

pub fn identity(id: &str, name: &str) -> Identity {
    Identity::new(client_id(id), Some(name.to_string()))
}

/// One simulated client: its own identity source, store connection, and
/// lifecycle coordinator
pub struct TestClient {
    pub identities: LocalIdentityProvider,
    pub connection: MemoryConnection,
    pub handle: CoordinatorHandle,
}

impl TestClient {
    /// Connect a new client to `store`, initially signed out
    pub fn connect(store: &MemoryPresenceStore) -> Self {
        Self::connect_with(store, CoordinatorConfig::default())
    }

    pub fn connect_with(store: &MemoryPresenceStore, config: CoordinatorConfig) -> Self {
        let identities = LocalIdentityProvider::new();
        let connection = store.connect();
        let handle = LifecycleCoordinator::spawn(&identities, Arc::new(connection.clone()), config);
        Self {
            identities,
            connection,
            handle,
        }
    }

    pub fn sign_in(&self, id: &str, name: &str) {
        self.identities.sign_in(identity(id, name));
    }

    pub fn sign_out(&self) {
        self.identities.sign_out();
    }

    /// Lose the store connection without retracting
    pub fn drop_connection(&self) -> usize {
        self.connection.disconnect()
    }

    pub async fn phase(&self, phase: LifecyclePhase) {
        let reached = within(self.handle.wait_for_phase(phase)).await;
        assert_eq!(reached, phase);
    }

    /// Wait until the online set holds exactly `ids`
    pub async fn sees(&self, ids: &[&str]) -> OnlineUsersState {
        within(self.handle.view().wait_until(|state| {
            !state.loading
                && state.users.len() == ids.len()
                && state.users.iter().zip(ids).all(|(user, id)| user.id.as_str() == *id)
        }))
        .await
    }

    pub fn key(&self, id: &str) -> PresenceKey {
        KeyPrefix::default().key(&client_id(id))
    }

    pub fn record(&self, id: &str) -> Option<PresenceRecord> {
        self.connection.store().record(&self.key(id))
    }
}

/// Sign-in request body
#[derive(Debug, Serialize)]
pub struct SignInRequest {
    pub id: String,
    pub name: Option<String>,
}

impl SignInRequest {
    pub fn unique() -> Self {
        let suffix = unique_suffix();
        Self {
            id: format!("user-{suffix}"),
            name: Some(format!("User {suffix}")),
        }
    }
}

/// Online user entry
#[derive(Debug, Clone, Deserialize)]
pub struct OnlineUserResponse {
    pub id: String,
    pub name: String,
}

/// Online users state as served by the agent
#[derive(Debug, Clone, Deserialize)]
pub struct OnlineStateResponse {
    pub users: Vec<OnlineUserResponse>,
    pub loading: bool,
    pub error: Option<String>,
}

impl OnlineStateResponse {
    pub fn ids(&self) -> Vec<&str> {
        self.users.iter().map(|user| user.id.as_str()).collect()
    }
}

/// Error body
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Health body
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub phase: String,
}
