//! Schema bootstrap
//!
//! Tables are created idempotently at startup; there is no migration history.

use sqlx::sqlite::SqlitePool;
use tracing::info;

/// Milliseconds since the Unix epoch, evaluated by SQLite
const NOW_MS: &str = "(CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))";

fn statements() -> [String; 4] {
    [
        format!(
            r"
            CREATE TABLE IF NOT EXISTS message_table (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id     INTEGER NOT NULL,
                raw         TEXT    NOT NULL,
                updated_at  INTEGER,
                created_at  INTEGER NOT NULL DEFAULT {NOW_MS},
                deleted_at  INTEGER
            )
            "
        ),
        "CREATE INDEX IF NOT EXISTS idx_message_table_room_id ON message_table (room_id)".to_string(),
        format!(
            r"
            CREATE TABLE IF NOT EXISTS danmaku_table (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id      INTEGER NOT NULL,
                sender_uid   INTEGER NOT NULL,
                sender_name  TEXT    NOT NULL,
                content      TEXT    NOT NULL,
                timestamp    INTEGER NOT NULL,
                raw          TEXT    NOT NULL,
                updated_at   INTEGER,
                created_at   INTEGER NOT NULL DEFAULT {NOW_MS},
                deleted_at   INTEGER
            )
            "
        ),
        "CREATE INDEX IF NOT EXISTS idx_danmaku_table_room_id ON danmaku_table (room_id, timestamp)"
            .to_string(),
    ]
}

/// Create `message_table` and `danmaku_table` if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in statements() {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!("Database schema ready");
    Ok(())
}
