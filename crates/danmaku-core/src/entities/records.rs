//! Persisted records produced by the processor

/// Every packet received for a room, stored verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub room_id: i64,
    pub raw: String,
}

impl RawMessage {
    /// Create a new raw message record
    pub fn new(room_id: i64, raw: impl Into<String>) -> Self {
        Self {
            room_id,
            raw: raw.into(),
        }
    }
}

/// A chat (danmaku) message extracted from a `DANMU_MSG` packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmakuRecord {
    pub room_id: i64,
    pub sender_uid: i64,
    pub sender_name: String,
    pub content: String,
    /// Event time as reported by the platform (seconds since the Unix epoch)
    pub timestamp: i64,
    pub raw: String,
}
