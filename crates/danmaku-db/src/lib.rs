//! # danmaku-db
//!
//! Database layer implementing the `MessageStore` trait with SQLite via SQLx.
//!
//! ## Overview
//!
//! - Connection pool management and schema bootstrap
//! - Row models with SQLx `FromRow` derives
//! - The `SqliteMessageStore` repository
//!
//! ## Usage
//!
//! ```rust,ignore
//! use danmaku_common::ProcessorConfig;
//! use danmaku_db::{create_pool, init_schema, SqliteMessageStore};
//!
//! async fn example(config: &ProcessorConfig) -> Result<(), sqlx::Error> {
//!     let pool = create_pool(&config.database).await?;
//!     init_schema(&pool).await?;
//!     let store = SqliteMessageStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, init_schema, SqlitePool};
pub use repositories::SqliteMessageStore;
