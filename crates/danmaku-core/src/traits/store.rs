//! Message store trait - the interface the processor persists through
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! (`danmaku-db`) provides the implementation.

use async_trait::async_trait;

use crate::entities::{DanmakuRecord, RawMessage};
use crate::error::DomainError;

/// Result type for store operations
pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a raw packet received for a room
    async fn store_raw(&self, message: &RawMessage) -> RepoResult<()>;

    /// Store an extracted chat message
    async fn store_danmaku(&self, record: &DanmakuRecord) -> RepoResult<()>;
}
