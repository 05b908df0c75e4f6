//! Store errors - failures reported by a presence store back-end

use thiserror::Error;

/// Error reported by a [`PresenceStore`](crate::PresenceStore) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("connection to the presence store was lost")]
    Disconnected,

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("invalid presence data: {0}")]
    Serialization(String),

    #[error("subscription closed")]
    Closed,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Wrap any backend failure
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    /// Whether the failure means the connection itself is gone
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
