//! Envelope processor
//!
//! Classifies one delivery and persists it:
//! 1. Envelope fails the wire contract: dead-letter.
//! 2. Packet is not JSON, or a store write fails: requeue.
//! 3. Raw packet stored; chat messages additionally stored as records.

use std::sync::Arc;

use async_trait::async_trait;
use danmaku_core::{LiveCommand, MessageStore, QueueEnvelope, RawMessage};
use danmaku_queue::{DeliveryHandler, Disposition};
use serde_json::Value;
use tracing::instrument;

/// Persists envelopes through a [`MessageStore`]
pub struct EnvelopeProcessor<S: ?Sized> {
    store: Arc<S>,
}

impl<S: MessageStore + ?Sized> EnvelopeProcessor<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Handle one envelope body
    #[instrument(skip_all)]
    pub async fn process(&self, body: &[u8]) -> Disposition {
        let envelope = match QueueEnvelope::from_wire(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Invalid envelope, dead-lettering"
                );
                return Disposition::DEAD_LETTER;
            }
        };
        let room_id = envelope.room_id;

        let packet: Value = match serde_json::from_str(&envelope.packet) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(room_id, error = %e, packet = %envelope.packet, "Packet is not JSON");
                return Disposition::RETRY;
            }
        };

        if let Err(e) = self
            .store
            .store_raw(&RawMessage::new(room_id, envelope.packet.as_str()))
            .await
        {
            tracing::error!(
                room_id,
                error = %e,
                code = e.code(),
                packet = %envelope.packet,
                "Failed to store raw packet"
            );
            return Disposition::RETRY;
        }

        let command = match LiveCommand::from_value(&packet, &envelope.packet) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(room_id, error = %e, packet = %envelope.packet, "Malformed command");
                return Disposition::RETRY;
            }
        };

        if let LiveCommand::Danmaku(message) = command {
            let record = message.into_record(room_id, envelope.packet.as_str());
            if let Err(e) = self.store.store_danmaku(&record).await {
                tracing::error!(
                    room_id,
                    error = %e,
                    code = e.code(),
                    packet = %envelope.packet,
                    "Failed to store danmaku"
                );
                return Disposition::RETRY;
            }
            tracing::debug!(
                room_id,
                sender = %record.sender_name,
                content = %record.content,
                "Danmaku stored"
            );
        } else {
            tracing::trace!(room_id, cmd = command.cmd(), "Packet stored");
        }

        Disposition::Ack
    }
}

#[async_trait]
impl<S: MessageStore + ?Sized + 'static> DeliveryHandler for EnvelopeProcessor<S> {
    async fn handle(&self, body: &[u8]) -> Disposition {
        self.process(body).await
    }
}
