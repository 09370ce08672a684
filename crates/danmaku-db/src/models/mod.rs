//! Database models - SQLx-compatible structs for SQLite tables

mod danmaku;
mod message;

pub use danmaku::DanmakuModel;
pub use message::MessageModel;
