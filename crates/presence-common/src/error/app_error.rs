//! Application error types
//!
//! Unified error handling for the presence binaries.

use presence_core::PresenceError;

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Redis errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Presence subsystem errors
    #[error(transparent)]
    Presence(#[from] PresenceError),

    // HTTP surface errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) => 2,
            Self::Cache(_) | Self::Server(_) => 3,
            Self::Presence(_) | Self::Internal(_) => 1,
        }
    }

    /// Get error code string
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Presence(e) => e.code(),
            Self::Server(_) => "SERVER_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn cache(err: impl std::fmt::Display) -> Self {
        Self::Cache(err.to_string())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Server(err.to_string())
    }
}
