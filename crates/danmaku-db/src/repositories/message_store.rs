//! SQLite implementation of MessageStore

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::instrument;

use danmaku_core::{DanmakuRecord, MessageStore, RawMessage, RepoResult};

use crate::models::{DanmakuModel, MessageModel};

use super::error::map_db_error;

/// SQLite implementation of MessageStore
#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Create a new SqliteMessageStore
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Latest raw packets stored for a room, newest first
    #[instrument(skip(self))]
    pub async fn recent_raw(&self, room_id: i64, limit: i64) -> RepoResult<Vec<RawMessage>> {
        let rows = sqlx::query_as::<_, MessageModel>(
            r"
            SELECT id, room_id, raw, updated_at, created_at, deleted_at
            FROM message_table
            WHERE room_id = ?1 AND deleted_at IS NULL
            ORDER BY id DESC
            LIMIT ?2
            ",
        )
        .bind(room_id)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(RawMessage::from).collect())
    }

    /// Latest chat messages stored for a room, newest first
    #[instrument(skip(self))]
    pub async fn recent_danmaku(&self, room_id: i64, limit: i64) -> RepoResult<Vec<DanmakuRecord>> {
        let rows = sqlx::query_as::<_, DanmakuModel>(
            r"
            SELECT id, room_id, sender_uid, sender_name, content, timestamp, raw,
                   updated_at, created_at, deleted_at
            FROM danmaku_table
            WHERE room_id = ?1 AND deleted_at IS NULL
            ORDER BY id DESC
            LIMIT ?2
            ",
        )
        .bind(room_id)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(DanmakuRecord::from).collect())
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    #[instrument(skip(self, message), fields(room_id = message.room_id))]
    async fn store_raw(&self, message: &RawMessage) -> RepoResult<()> {
        sqlx::query("INSERT INTO message_table (room_id, raw) VALUES (?1, ?2)")
            .bind(message.room_id)
            .bind(&message.raw)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self, record), fields(room_id = record.room_id, sender_uid = record.sender_uid))]
    async fn store_danmaku(&self, record: &DanmakuRecord) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO danmaku_table (room_id, sender_uid, sender_name, content, timestamp, raw)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(record.room_id)
        .bind(record.sender_uid)
        .bind(&record.sender_name)
        .bind(&record.content)
        .bind(record.timestamp)
        .bind(&record.raw)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, init_schema};
    use danmaku_common::DatabaseConfig;

    async fn store() -> SqliteMessageStore {
        let pool = create_pool(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        init_schema(&pool).await.unwrap();
        SqliteMessageStore::new(pool)
    }

    fn record(room_id: i64, content: &str) -> DanmakuRecord {
        DanmakuRecord {
            room_id,
            sender_uid: 42,
            sender_name: "viewer".to_string(),
            content: content.to_string(),
            timestamp: 1_700_000_000,
            raw: r#"{"cmd":"DANMU_MSG"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_raw() {
        let store = store().await;
        store.store_raw(&RawMessage::new(7, "{\"cmd\":\"A\"}")).await.unwrap();
        store.store_raw(&RawMessage::new(7, "{\"cmd\":\"B\"}")).await.unwrap();
        store.store_raw(&RawMessage::new(8, "{\"cmd\":\"C\"}")).await.unwrap();

        let rows = store.recent_raw(7, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw, "{\"cmd\":\"B\"}");
        assert_eq!(rows[1].raw, "{\"cmd\":\"A\"}");
    }

    #[tokio::test]
    async fn test_store_danmaku() {
        let store = store().await;
        let expected = record(7, "hello");
        store.store_danmaku(&expected).await.unwrap();

        let rows = store.recent_danmaku(7, 10).await.unwrap();
        assert_eq!(rows, vec![expected]);
        assert!(store.recent_danmaku(8, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_without_schema_fails() {
        let pool = create_pool(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        let store = SqliteMessageStore::new(pool);

        let err = store.store_raw(&RawMessage::new(1, "{}")).await.unwrap_err();
        assert!(err.to_string().starts_with("Database error:"));
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
