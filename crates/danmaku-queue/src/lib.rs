//! # danmaku-queue
//!
//! Reliable delivery over RabbitMQ (AMQP 0-9-1).
//!
//! - [`Topology`]: the exchange / queue / dead-letter graph, declared idempotently
//! - [`Producer`]: publish-with-confirmation, bounded transport retry, graceful close
//! - [`Consumer`]: prefetch-bounded consumption handing each delivery to a
//!   [`DeliveryHandler`] and settling it from the returned [`Disposition`]

pub mod connection;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod topology;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{connect, redact_url};
pub use consumer::{Consumer, ConsumerConfig, DeliveryHandler, Disposition};
pub use error::{PublishError, QueueError, QueueResult};
pub use producer::{Producer, ProducerConfig};
pub use topology::{
    BindingSpec, DeadLetter, Declare, ExchangeSpec, QueueSpec, Topology, DLX_SUFFIX,
    EXCHANGE_NAME, FAILED_SUFFIX, QUEUE_NAME,
};
