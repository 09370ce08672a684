//! Session errors

use tokio_tungstenite::tungstenite;

/// Transport faults that end a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    #[error("Outbound channel closed")]
    OutboundClosed,

    #[error("Failed to encode auth payload: {0}")]
    AuthPayload(#[from] serde_json::Error),
}

impl From<tungstenite::Error> for SessionError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}
