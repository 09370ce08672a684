//! Where sessions hand decoded events

use async_trait::async_trait;
use danmaku_core::QueueEnvelope;
use danmaku_queue::{Producer, PublishError};

/// Destination for forwarded envelopes
#[async_trait]
pub trait EnvelopeSink: Send + Sync + 'static {
    /// Deliver one envelope; returns once the destination has accepted it
    async fn publish(&self, envelope: &QueueEnvelope) -> Result<(), PublishError>;
}

#[async_trait]
impl EnvelopeSink for Producer {
    async fn publish(&self, envelope: &QueueEnvelope) -> Result<(), PublishError> {
        Producer::publish(self, envelope).await
    }
}
