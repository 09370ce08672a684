//! Error types for broker operations

/// Errors from connecting to the broker or declaring topology
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("{kind} '{name}' already exists with different properties")]
    Mismatch { kind: &'static str, name: String },

    #[error("Connection not available")]
    NotConnected,
}

/// Result type for broker operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Reasons a publish did not end in a broker confirmation
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Producer is closed")]
    Closed,

    #[error("Broker refused the message (nack)")]
    Nacked,

    #[error("Failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: QueueError,
    },
}

impl PublishError {
    /// Get error code for logs
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Closed => "PRODUCER_CLOSED",
            Self::Nacked => "PUBLISH_NACKED",
            Self::Serialization(_) => "PUBLISH_SERIALIZATION",
            Self::Transport { .. } => "PUBLISH_TRANSPORT",
        }
    }
}
