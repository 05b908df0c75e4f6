//! Presence errors - the failure taxonomy observed by consumers

use thiserror::Error;

use super::StoreError;
use crate::value_objects::{ClientId, Epoch};

/// Presence subsystem errors
///
/// All of these are reported as observable state; none is fatal to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// No active session; presence features are disabled
    #[error("Not authenticated")]
    AuthUnavailable,

    /// Publish or retract could not write to the store
    #[error("Failed to update status: {source}")]
    StoreWriteFailed {
        client_id: ClientId,
        #[source]
        source: StoreError,
    },

    /// The online-set subscription failed; emissions are halted
    #[error("Database error: {0}")]
    SubscriptionFailed(#[source] StoreError),

    /// Completion arrived for an epoch that is no longer current
    #[error("Stale completion for epoch {epoch}")]
    StaleCallback { epoch: Epoch },
}

/// Result type for presence operations
pub type PresenceResult<T> = Result<T, PresenceError>;

impl PresenceError {
    pub fn store_write(client_id: &ClientId, source: StoreError) -> Self {
        Self::StoreWriteFailed {
            client_id: client_id.clone(),
            source,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthUnavailable => "AUTH_UNAVAILABLE",
            Self::StoreWriteFailed { .. } => "STORE_WRITE_FAILED",
            Self::SubscriptionFailed(_) => "SUBSCRIPTION_FAILED",
            Self::StaleCallback { .. } => "STALE_CALLBACK",
        }
    }

    /// Whether consumers should ever see this error
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::StaleCallback { .. })
    }

    /// Whether presence recovers only after an explicit restart
    pub fn halts_emissions(&self) -> bool {
        matches!(self, Self::SubscriptionFailed(_))
    }
}
