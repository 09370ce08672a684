//! Repository implementations
//!
//! SQLite implementation of the `MessageStore` trait defined in danmaku-core.

mod error;
mod message_store;

pub use message_store::SqliteMessageStore;
