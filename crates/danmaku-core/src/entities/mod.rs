//! Domain entities - core business objects

mod envelope;
mod records;

pub use envelope::{EnvelopeError, QueueEnvelope};
pub use records::{DanmakuRecord, RawMessage};
