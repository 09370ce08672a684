//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DomainError {
    /// Get error code for logs
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}
