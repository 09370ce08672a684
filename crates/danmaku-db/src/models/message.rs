//! Raw message database model

use danmaku_core::RawMessage;
use sqlx::FromRow;

/// Database model for `message_table`
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub room_id: i64,
    pub raw: String,
    pub updated_at: Option<i64>,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl MessageModel {
    /// Check if the row is soft deleted
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl From<MessageModel> for RawMessage {
    fn from(model: MessageModel) -> Self {
        RawMessage::new(model.room_id, model.raw)
    }
}
