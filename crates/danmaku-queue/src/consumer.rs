//! Acknowledging consumer.
//!
//! Reads the main queue with a bounded prefetch, hands each body to a
//! [`DeliveryHandler`] and settles the delivery from its [`Disposition`].
//! The topology is declared before consuming starts and a refusal is returned
//! to the caller. Later connection loss is logged and followed by a reconnect
//! after a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{Channel, Connection};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::connection::connect;
use crate::error::{QueueError, QueueResult};
use crate::topology::{Declare, Topology};

/// Header carrying the number of previous deliveries (quorum queues)
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Outcome of handling one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue
    Ack,
    /// Not processed; requeue for another attempt or dead-letter
    Reject { requeue: bool },
}

impl Disposition {
    /// Reject and requeue
    pub const RETRY: Self = Self::Reject { requeue: true };
    /// Reject without requeue, routing the message to the dead-letter queue
    pub const DEAD_LETTER: Self = Self::Reject { requeue: false };

    /// Apply the redelivery cap
    ///
    /// `delivery_count` is the number of earlier deliveries as reported by the
    /// broker. A requeue is turned into a dead-letter once this delivery is
    /// attempt number `max_deliveries` or later. Without a count, or without
    /// a cap, the disposition is unchanged.
    #[must_use]
    pub fn settle(self, delivery_count: Option<u32>, max_deliveries: Option<u32>) -> Self {
        match (self, delivery_count, max_deliveries) {
            (Self::Reject { requeue: true }, Some(count), Some(max))
                if count.saturating_add(1) >= max =>
            {
                Self::DEAD_LETTER
            }
            (disposition, _, _) => disposition,
        }
    }
}

/// Processes the body of one delivery
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn handle(&self, body: &[u8]) -> Disposition;
}

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// AMQP connection URL
    pub url: String,
    /// Broker instance name for logs
    pub name: String,
    /// Maximum unacknowledged deliveries in flight
    pub prefetch_count: u16,
    /// Total delivery attempts before a failing message is dead-lettered
    pub max_deliveries: Option<u32>,
    /// Delay before reconnecting after a connection error
    pub reconnect_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost".to_string(),
            name: "local".to_string(),
            prefetch_count: 10,
            max_deliveries: Some(5),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl ConsumerConfig {
    /// Build from a configured broker instance and the processor settings
    #[must_use]
    pub fn for_instance(
        instance: &danmaku_common::BrokerInstance,
        config: &danmaku_common::ProcessorConfig,
    ) -> Self {
        Self {
            url: instance.url.clone(),
            name: instance.name.clone(),
            prefetch_count: config.prefetch_count,
            max_deliveries: config.max_deliveries,
            ..Self::default()
        }
    }
}

/// Number of earlier deliveries reported by the broker, if any
#[must_use]
pub fn delivery_count(headers: Option<&FieldTable>) -> Option<u32> {
    let value = headers?
        .inner()
        .get(&ShortString::from(DELIVERY_COUNT_HEADER))?;

    match *value {
        AMQPValue::ShortShortUInt(n) => Some(u32::from(n)),
        AMQPValue::ShortUInt(n) => Some(u32::from(n)),
        AMQPValue::LongUInt(n) => Some(n),
        AMQPValue::ShortShortInt(n) => u32::try_from(n).ok(),
        AMQPValue::ShortInt(n) => u32::try_from(n).ok(),
        AMQPValue::LongInt(n) => u32::try_from(n).ok(),
        AMQPValue::LongLongInt(n) => u32::try_from(n).ok(),
        _ => None,
    }
}

/// Consumer bound to one broker instance
pub struct Consumer<H> {
    config: ConsumerConfig,
    topology: Topology,
    handler: Arc<H>,
}

/// One connection and the channel consuming on it
struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    async fn close(self, broker: &str, reason: &str) {
        if let Err(e) = self.channel.close(200, reason).await {
            tracing::debug!(broker, error = %e, "Failed to close channel");
        }
        if let Err(e) = self.connection.close(200, reason).await {
            tracing::debug!(broker, error = %e, "Failed to close connection");
        }
    }
}

impl<H: DeliveryHandler> Consumer<H> {
    /// Create a new consumer
    pub fn new(config: ConsumerConfig, topology: Topology, handler: Arc<H>) -> Self {
        Self {
            config,
            topology,
            handler,
        }
    }

    /// Declare the topology, then consume on a spawned task
    ///
    /// If the broker cannot be reached the task keeps retrying, declaring the
    /// topology on every new connection.
    ///
    /// # Errors
    ///
    /// Returns the declaration error when the broker is reachable but refuses
    /// the topology. Nothing is spawned in that case.
    pub async fn start(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> QueueResult<tokio::task::JoinHandle<()>> {
        let link = match self.open().await {
            Ok(link) => {
                if let Err(e) = self.prepare(&link.channel).await {
                    link.close(&self.config.name, "topology declaration failed").await;
                    return Err(e);
                }
                Some(link)
            }
            Err(e) => {
                tracing::error!(
                    broker = %self.config.name,
                    error = %e,
                    "Broker unreachable, consumer will retry"
                );
                None
            }
        };

        Ok(tokio::spawn(self.run(link, shutdown)))
    }

    /// Declare the topology this consumer reads from
    pub async fn prepare<D: Declare + ?Sized>(&self, target: &D) -> QueueResult<()> {
        if let Err(e) = self.topology.declare(target).await {
            tracing::error!(
                broker = %self.config.name,
                queue = %self.topology.queue(),
                error = %e,
                "Topology declaration failed"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Consume until `shutdown` flips to true, reconnecting on errors
    async fn run(self, mut link: Option<Link>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let connected = match link.take() {
                Some(link) => Ok(link),
                None => self.reconnect().await,
            };
            let result = match connected {
                Ok(link) => self.consume(link, &mut shutdown).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    tracing::info!(broker = %self.config.name, "Consumer shutting down");
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        broker = %self.config.name,
                        error = %e,
                        "Consumer error, reconnecting..."
                    );
                    let stop = tokio::select! {
                        () = tokio::time::sleep(self.config.reconnect_delay) => *shutdown.borrow(),
                        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
                    };
                    if stop {
                        break;
                    }
                }
            }
        }
    }

    async fn open(&self) -> QueueResult<Link> {
        let connection = connect(&self.config.url, &self.config.name).await?;
        let channel = connection.create_channel().await?;
        Ok(Link {
            connection,
            channel,
        })
    }

    async fn reconnect(&self) -> QueueResult<Link> {
        let link = self.open().await?;
        match self.prepare(&link.channel).await {
            Ok(()) => Ok(link),
            Err(e) => {
                link.close(&self.config.name, "topology declaration failed").await;
                Err(e)
            }
        }
    }

    /// One connection lifetime; Ok on shutdown, Err on connection loss
    async fn consume(&self, link: Link, shutdown: &mut watch::Receiver<bool>) -> QueueResult<()> {
        link.channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await?;

        let mut deliveries = link
            .channel
            .basic_consume(
                self.topology.queue(),
                &consumer_tag(&self.config.name),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(
            broker = %self.config.name,
            queue = %self.topology.queue(),
            prefetch = self.config.prefetch_count,
            "Consumer started"
        );

        let mut in_flight = JoinSet::new();
        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            tokio::select! {
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        in_flight.spawn(process(
                            self.handler.clone(),
                            delivery,
                            self.config.max_deliveries,
                        ));
                    }
                    Some(Err(e)) => break Err(e.into()),
                    None => break Err(QueueError::NotConnected),
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        // Settle what was already handed out before closing
        while in_flight.join_next().await.is_some() {}

        if outcome.is_ok() {
            link.close(&self.config.name, "consumer stopped").await;
        }
        outcome
    }
}

/// Unique per connection so a reconnect never collides with a stale tag
fn consumer_tag(name: &str) -> String {
    format!("{name}-consumer-{}", uuid::Uuid::new_v4().simple())
}

async fn process<H: DeliveryHandler>(handler: Arc<H>, delivery: Delivery, max: Option<u32>) {
    let count = delivery_count(delivery.properties.headers().as_ref());
    let disposition = handler.handle(&delivery.data).await.settle(count, max);

    let result = match disposition {
        Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
        Disposition::Reject { requeue } => {
            if !requeue {
                tracing::warn!(
                    delivery_tag = delivery.delivery_tag,
                    delivery_count = ?count,
                    "Dead-lettering delivery"
                );
            }
            delivery
                .acker
                .reject(BasicRejectOptions { requeue })
                .await
        }
    };

    if let Err(e) = result {
        tracing::error!(
            delivery_tag = delivery.delivery_tag,
            error = %e,
            "Failed to settle delivery"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBroker;
    use crate::topology::{QueueSpec, QUEUE_NAME};

    struct AckAll;

    #[async_trait]
    impl DeliveryHandler for AckAll {
        async fn handle(&self, _body: &[u8]) -> Disposition {
            Disposition::Ack
        }
    }

    fn consumer() -> Consumer<AckAll> {
        Consumer::new(ConsumerConfig::default(), Topology::default(), Arc::new(AckAll))
    }

    fn headers_with(value: AMQPValue) -> FieldTable {
        let mut headers = FieldTable::default();
        headers.insert(DELIVERY_COUNT_HEADER.into(), value);
        headers
    }

    #[test]
    fn test_settle_without_count_is_unchanged() {
        assert_eq!(Disposition::RETRY.settle(None, Some(5)), Disposition::RETRY);
        assert_eq!(Disposition::Ack.settle(None, Some(5)), Disposition::Ack);
    }

    #[test]
    fn test_settle_without_cap_is_unchanged() {
        assert_eq!(Disposition::RETRY.settle(Some(100), None), Disposition::RETRY);
    }

    #[test]
    fn test_settle_caps_requeue() {
        // Fourth earlier delivery means this is the fifth attempt
        assert_eq!(Disposition::RETRY.settle(Some(3), Some(5)), Disposition::RETRY);
        assert_eq!(Disposition::RETRY.settle(Some(4), Some(5)), Disposition::DEAD_LETTER);
        assert_eq!(Disposition::RETRY.settle(Some(9), Some(5)), Disposition::DEAD_LETTER);
    }

    #[test]
    fn test_settle_leaves_ack_and_dead_letter_alone() {
        assert_eq!(Disposition::Ack.settle(Some(9), Some(5)), Disposition::Ack);
        assert_eq!(
            Disposition::DEAD_LETTER.settle(Some(0), Some(5)),
            Disposition::DEAD_LETTER
        );
    }

    #[test]
    fn test_delivery_count_header() {
        assert_eq!(delivery_count(None), None);
        assert_eq!(delivery_count(Some(&FieldTable::default())), None);
        assert_eq!(
            delivery_count(Some(&headers_with(AMQPValue::LongLongInt(3)))),
            Some(3)
        );
        assert_eq!(
            delivery_count(Some(&headers_with(AMQPValue::LongUInt(7)))),
            Some(7)
        );
        assert_eq!(
            delivery_count(Some(&headers_with(AMQPValue::LongInt(-1)))),
            None
        );
        assert_eq!(
            delivery_count(Some(&headers_with(AMQPValue::LongString("2".into())))),
            None
        );
    }

    #[test]
    fn test_consumer_tags_are_unique() {
        let a = consumer_tag("local");
        let b = consumer_tag("local");
        assert!(a.starts_with("local-consumer-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_prepare_declares_topology() {
        let broker = FakeBroker::default();

        consumer().prepare(&broker).await.unwrap();

        assert!(broker.queues.lock().contains_key(QUEUE_NAME));
        assert_eq!(broker.bindings.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_prepare_fails_on_conflicting_queue() {
        let broker = FakeBroker::default();
        broker
            .declare_queue(&QueueSpec {
                name: QUEUE_NAME.to_string(),
                durable: false,
                dead_letter: None,
            })
            .await
            .unwrap();

        let err = consumer().prepare(&broker).await.unwrap_err();

        assert!(matches!(err, QueueError::Mismatch { kind: "queue", .. }));
        assert!(broker.bindings.lock().is_empty());
    }

    #[test]
    fn test_config_for_instance() {
        let instance = danmaku_common::BrokerInstance {
            url: "amqp://remote".to_string(),
            name: "remote".to_string(),
        };
        let processor = danmaku_common::ProcessorConfig::from_lookup(&|key: &str| match key {
            "PREFETCH_COUNT" => Some("20".to_string()),
            "MAX_DELIVERIES" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();

        let config = ConsumerConfig::for_instance(&instance, &processor);
        assert_eq!(config.url, "amqp://remote");
        assert_eq!(config.name, "remote");
        assert_eq!(config.prefetch_count, 20);
        assert_eq!(config.max_deliveries, None);
    }
}
