//! Chat message database model

use danmaku_core::DanmakuRecord;
use sqlx::FromRow;

/// Database model for `danmaku_table`
#[derive(Debug, Clone, FromRow)]
pub struct DanmakuModel {
    pub id: i64,
    pub room_id: i64,
    pub sender_uid: i64,
    pub sender_name: String,
    pub content: String,
    pub timestamp: i64,
    pub raw: String,
    pub updated_at: Option<i64>,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<DanmakuModel> for DanmakuRecord {
    fn from(model: DanmakuModel) -> Self {
        DanmakuRecord {
            room_id: model.room_id,
            sender_uid: model.sender_uid,
            sender_name: model.sender_name,
            content: model.content,
            timestamp: model.timestamp,
            raw: model.raw,
        }
    }
}
