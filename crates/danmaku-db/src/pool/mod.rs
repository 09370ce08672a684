//! Database connection pool management

mod schema;
mod sqlite;

pub use schema::init_schema;
pub use sqlite::create_pool;

// Re-export SqlitePool for convenience
pub use sqlx::sqlite::SqlitePool;
