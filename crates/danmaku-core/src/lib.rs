//! # danmaku-core
//!
//! Domain layer containing the queue envelope, persisted records, the live command
//! union, and the persistence trait. This crate has zero dependencies on
//! infrastructure (broker, database, WebSocket).

pub mod commands;
pub mod entities;
pub mod error;
pub mod traits;

// Re-export commonly used types at crate root
pub use commands::{
    CommandError, DanmakuMessage, InteractWord, LiveCommand, WatchedChange, CMD_DANMU_MSG,
    CMD_INTERACT_WORD, CMD_WATCHED_CHANGE,
};
pub use entities::{DanmakuRecord, EnvelopeError, QueueEnvelope, RawMessage};
pub use error::DomainError;
pub use traits::{MessageStore, RepoResult};
