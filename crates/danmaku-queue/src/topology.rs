//! Delivery topology.
//!
//! The main exchange routes envelopes to the main queue; rejected-without-requeue
//! messages are dead-lettered through the DLX into the failed queue. Names and
//! suffixes are part of the wire contract between receiver and processor.

use async_trait::async_trait;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongString};
use lapin::{Channel, ExchangeKind};

use crate::error::QueueResult;

/// Main queue name, also the routing key used for publishing
pub const QUEUE_NAME: &str = "danmaku_messages";
/// Main exchange name
pub const EXCHANGE_NAME: &str = "danmaku-events";
/// Suffix appended to the main exchange for its dead-letter exchange
pub const DLX_SUFFIX: &str = "-dlx";
/// Suffix appended to the main queue for its dead-letter queue
pub const FAILED_SUFFIX: &str = "-failed";

const ARG_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
const ARG_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";

/// A direct exchange declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub durable: bool,
}

/// Where a queue sends rejected messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub exchange: String,
    pub routing_key: String,
}

/// A queue declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub dead_letter: Option<DeadLetter>,
}

impl QueueSpec {
    /// Queue arguments as sent on the wire
    #[must_use]
    pub fn arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        if let Some(dl) = &self.dead_letter {
            args.insert(
                ARG_DEAD_LETTER_EXCHANGE.into(),
                AMQPValue::LongString(LongString::from(dl.exchange.as_str())),
            );
            args.insert(
                ARG_DEAD_LETTER_ROUTING_KEY.into(),
                AMQPValue::LongString(LongString::from(dl.routing_key.as_str())),
            );
        }
        args
    }
}

/// A queue-to-exchange binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

/// Something topology can be declared against
///
/// Implemented for [`lapin::Channel`]. Declarations must be idempotent:
/// redeclaring with identical properties succeeds, redeclaring with
/// different properties fails.
#[async_trait]
pub trait Declare: Send + Sync {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> QueueResult<()>;
    async fn declare_queue(&self, queue: &QueueSpec) -> QueueResult<()>;
    async fn bind_queue(&self, binding: &BindingSpec) -> QueueResult<()>;
}

/// The full exchange / queue / binding graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::for_names(EXCHANGE_NAME, QUEUE_NAME)
    }
}

impl Topology {
    /// Build the graph for a main exchange and main queue
    #[must_use]
    pub fn for_names(exchange: &str, queue: &str) -> Self {
        let dlx = format!("{exchange}{DLX_SUFFIX}");
        let failed = format!("{queue}{FAILED_SUFFIX}");

        Self {
            exchanges: vec![
                ExchangeSpec {
                    name: exchange.to_string(),
                    durable: true,
                },
                ExchangeSpec {
                    name: dlx.clone(),
                    durable: true,
                },
            ],
            queues: vec![
                QueueSpec {
                    name: queue.to_string(),
                    durable: true,
                    dead_letter: Some(DeadLetter {
                        exchange: dlx.clone(),
                        routing_key: failed.clone(),
                    }),
                },
                QueueSpec {
                    name: failed.clone(),
                    durable: true,
                    dead_letter: None,
                },
            ],
            bindings: vec![
                BindingSpec {
                    queue: queue.to_string(),
                    exchange: exchange.to_string(),
                    routing_key: queue.to_string(),
                },
                BindingSpec {
                    queue: failed.clone(),
                    exchange: dlx,
                    routing_key: failed,
                },
            ],
        }
    }

    /// Exchange producers publish to
    #[must_use]
    pub fn exchange(&self) -> &str {
        self.exchanges.first().map_or(EXCHANGE_NAME, |e| e.name.as_str())
    }

    /// Queue consumers read from, also the publish routing key
    #[must_use]
    pub fn queue(&self) -> &str {
        self.queues.first().map_or(QUEUE_NAME, |q| q.name.as_str())
    }

    /// Declare exchanges, then queues, then bindings
    pub async fn declare<D: Declare + ?Sized>(&self, target: &D) -> QueueResult<()> {
        for exchange in &self.exchanges {
            target.declare_exchange(exchange).await?;
        }
        for queue in &self.queues {
            target.declare_queue(queue).await?;
        }
        for binding in &self.bindings {
            target.bind_queue(binding).await?;
        }

        tracing::debug!(
            exchange = %self.exchange(),
            queue = %self.queue(),
            "Topology declared"
        );
        Ok(())
    }
}

#[async_trait]
impl Declare for Channel {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> QueueResult<()> {
        self.exchange_declare(
            &exchange.name,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: exchange.durable,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn declare_queue(&self, queue: &QueueSpec) -> QueueResult<()> {
        self.queue_declare(
            &queue.name,
            QueueDeclareOptions {
                durable: queue.durable,
                ..QueueDeclareOptions::default()
            },
            queue.arguments(),
        )
        .await?;
        Ok(())
    }

    async fn bind_queue(&self, binding: &BindingSpec) -> QueueResult<()> {
        self.queue_bind(
            &binding.queue,
            &binding.exchange,
            &binding.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }
}
