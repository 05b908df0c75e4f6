//! Presence publisher
//!
//! Writes the client's own record and manages its disconnect guarantee.
//!
//! `publish` is two store operations: the Online write, then the guarantee
//! registration. A hard disconnect between the two leaves the record Online
//! until the client next publishes; consumers should treat Online with an old
//! `lastSeen` as advisory.

use std::sync::Arc;

use chrono::Utc;
use presence_core::{
    KeyPrefix, PresenceError, PresenceKey, PresenceRecord, PresenceResult, PresenceStore, Session,
};
use tracing::{debug, error, info, warn};

/// Outcome of a retract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retraction {
    /// The guarantee was released and the Offline record written
    Retracted(PresenceRecord),
    /// No guarantee was pending: already retracted, or fired by the store
    AlreadyOffline,
}

/// Publishes and retracts one client's presence record
#[derive(Clone)]
pub struct PresencePublisher {
    store: Arc<dyn PresenceStore>,
    prefix: KeyPrefix,
}

impl std::fmt::Debug for PresencePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresencePublisher")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PresencePublisher {
    pub fn new(store: Arc<dyn PresenceStore>, prefix: KeyPrefix) -> Self {
        Self { store, prefix }
    }

    pub fn key_for(&self, session: &Session) -> PresenceKey {
        self.prefix.key(session.client_id())
    }

    /// Mark the session Online and register its Offline guarantee
    ///
    /// Never retries. When the guarantee cannot be registered the record is
    /// rolled back to Offline on a best-effort basis.
    pub async fn publish(&self, session: &Session) -> PresenceResult<PresenceRecord> {
        let key = self.key_for(session);
        let client_id = session.client_id();
        let record = PresenceRecord::online(session, Utc::now());

        if let Err(e) = self.store.write(&key, &record).await {
            warn!(client_id = %client_id, error = %e, "Failed to write online record");
            return Err(PresenceError::store_write(client_id, e));
        }

        let offline = record.to_offline(record.last_seen);
        if let Err(e) = self
            .store
            .register_disconnect_guarantee(&key, &offline)
            .await
        {
            warn!(client_id = %client_id, error = %e, "Failed to register disconnect guarantee");
            if let Err(rollback) = self.store.write(&key, &offline.seen_at(Utc::now())).await {
                error!(
                    client_id = %client_id,
                    error = %rollback,
                    "Rollback to offline failed, record stays online until next publish"
                );
            }
            return Err(PresenceError::store_write(client_id, e));
        }

        info!(client_id = %client_id, "Presence published");
        Ok(record)
    }

    /// Release the guarantee and mark the session Offline
    ///
    /// Idempotent: without a pending guarantee nothing is written.
    pub async fn retract(&self, session: &Session) -> PresenceResult<Retraction> {
        let key = self.key_for(session);
        let client_id = session.client_id();

        let pending = self
            .store
            .cancel_guarantee(&key)
            .await
            .map_err(|e| PresenceError::store_write(client_id, e))?;
        let Some(pending) = pending else {
            debug!(client_id = %client_id, "No pending guarantee, already offline");
            return Ok(Retraction::AlreadyOffline);
        };

        let offline = pending.seen_at(Utc::now());
        if let Err(e) = self.store.write(&key, &offline).await {
            warn!(client_id = %client_id, error = %e, "Failed to write offline record");
            // Keep the store able to take the record offline later
            if let Err(restore) = self.store.register_disconnect_guarantee(&key, &pending).await {
                error!(client_id = %client_id, error = %restore, "Failed to restore disconnect guarantee");
            }
            return Err(PresenceError::store_write(client_id, e));
        }

        info!(client_id = %client_id, "Presence retracted");
        Ok(Retraction::Retracted(offline))
    }
}
