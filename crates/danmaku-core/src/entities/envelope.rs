//! Queue envelope - the unit crossing the broker between receiver and processor
//!
//! Wire format (JSON): `{"roomId": number, "packet": string, "timestamp": number}`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A decoded frame body captured from one room, ready to be published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEnvelope {
    /// Live room the packet was received from
    pub room_id: i64,
    /// Raw decoded frame body (JSON text)
    pub packet: String,
    /// Capture time in milliseconds since the Unix epoch (producer clock)
    pub timestamp: i64,
}

/// Reasons an incoming envelope body does not satisfy the wire contract
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Envelope is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Envelope field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

impl QueueEnvelope {
    /// Create an envelope stamped with the current time
    pub fn new(room_id: i64, packet: impl Into<String>) -> Self {
        Self::with_timestamp(room_id, packet, Utc::now().timestamp_millis())
    }

    /// Create an envelope with an explicit capture time
    pub fn with_timestamp(room_id: i64, packet: impl Into<String>, timestamp: i64) -> Self {
        Self {
            room_id,
            packet: packet.into(),
            timestamp,
        }
    }

    /// Serialize to the JSON wire body
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Validate and decode a wire body.
    ///
    /// Field types are checked against the raw JSON so that `roomId: "1"` or
    /// `timestamp: 1.5` are rejected rather than coerced.
    pub fn from_wire(body: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(body)?;
        let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

        let room_id = object
            .get("roomId")
            .and_then(Value::as_i64)
            .ok_or(EnvelopeError::InvalidField {
                field: "roomId",
                expected: "an integer",
            })?;

        let packet = object
            .get("packet")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::InvalidField {
                field: "packet",
                expected: "a string",
            })?;

        let timestamp = object
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or(EnvelopeError::InvalidField {
                field: "timestamp",
                expected: "an integer",
            })?;

        Ok(Self::with_timestamp(room_id, packet, timestamp))
    }
}
