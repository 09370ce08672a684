//! Application error types
//!
//! Top-level error for process startup and shutdown paths. Per-message and
//! per-frame faults are handled inside their own loops and never reach here.

use std::fmt;

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Broker errors
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Topology declaration failed: {0}")]
    Topology(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Get error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Broker(_) => "BROKER_ERROR",
            Self::Topology(_) => "TOPOLOGY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// Create a broker error
    #[must_use]
    pub fn broker(msg: impl fmt::Display) -> Self {
        Self::Broker(msg.to_string())
    }

    /// Create a database error
    #[must_use]
    pub fn database(msg: impl fmt::Display) -> Self {
        Self::Database(msg.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
