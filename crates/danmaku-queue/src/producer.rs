//! Confirmed publisher.
//!
//! Every publish waits for the broker's confirmation. Transport failures drop
//! the current channel and retry on a fresh one up to `max_attempts` in total;
//! a broker nack is final. `close` waits for in-flight publishes to resolve
//! before tearing the connection down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use danmaku_core::QueueEnvelope;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel, Connection};
use tokio::sync::{Mutex, RwLock};

use crate::connection::connect;
use crate::error::{PublishError, QueueError, QueueResult};
use crate::topology::Topology;

const PERSISTENT: u8 = 2;
const CONTENT_TYPE_JSON: &str = "application/json";

/// Producer configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// AMQP connection URL
    pub url: String,
    /// Name used in connection logs
    pub name: String,
    /// Total publish attempts per envelope (first try included)
    pub max_attempts: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost".to_string(),
            name: "producer".to_string(),
            max_attempts: 2,
        }
    }
}

impl From<&danmaku_common::BrokerConfig> for ProducerConfig {
    fn from(config: &danmaku_common::BrokerConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_attempts: config.publish_max_attempts.max(1),
            ..Self::default()
        }
    }
}

struct Link {
    connection: Connection,
    channel: Channel,
    generation: u64,
}

/// Publishes envelopes to the main exchange with publisher confirms
pub struct Producer {
    config: ProducerConfig,
    topology: Topology,
    link: Mutex<Option<Link>>,
    generation: AtomicU64,
    /// Publishes hold a read guard; `close` takes the write guard to drain them
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("name", &self.config.name)
            .field("exchange", &self.topology.exchange())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Producer {
    /// Create a producer; the connection is opened on first use
    #[must_use]
    pub fn new(config: ProducerConfig, topology: Topology) -> Self {
        Self {
            config,
            topology,
            link: Mutex::new(None),
            generation: AtomicU64::new(0),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a producer and open its connection immediately
    pub async fn connect(config: ProducerConfig, topology: Topology) -> QueueResult<Self> {
        let producer = Self::new(config, topology);
        producer.channel().await?;
        Ok(producer)
    }

    /// Declare the producer's topology on its channel
    pub async fn declare_topology(&self) -> QueueResult<()> {
        let (channel, _) = self.channel().await?;
        self.topology.declare(&channel).await
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish one envelope and wait for the broker's confirmation
    pub async fn publish(&self, envelope: &QueueEnvelope) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        let _in_flight = self.gate.read().await;
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let payload = envelope.to_json()?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.publish_once(&payload).await {
                Ok(true) => {
                    tracing::trace!(room_id = envelope.room_id, attempt, "Publish confirmed");
                    return Ok(());
                }
                Ok(false) => {
                    tracing::error!(
                        room_id = envelope.room_id,
                        packet = %envelope.packet,
                        "Broker nacked publish"
                    );
                    return Err(PublishError::Nacked);
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        room_id = envelope.room_id,
                        attempt,
                        error = %e,
                        "Publish failed, retrying on a new channel"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        room_id = envelope.room_id,
                        attempts = attempt,
                        error = %e,
                        packet = %envelope.packet,
                        "Publish failed"
                    );
                    return Err(PublishError::Transport {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Ok(true) on ack, Ok(false) on nack
    async fn publish_once(&self, payload: &[u8]) -> QueueResult<bool> {
        let (channel, generation) = self.channel().await?;

        let result = async {
            let properties = BasicProperties::default()
                .with_delivery_mode(PERSISTENT)
                .with_content_type(CONTENT_TYPE_JSON.into());

            let confirm = channel
                .basic_publish(
                    self.topology.exchange(),
                    self.topology.queue(),
                    BasicPublishOptions::default(),
                    payload,
                    properties,
                )
                .await?;
            Ok::<_, QueueError>(!confirm.await?.is_nack())
        }
        .await;

        if result.is_err() {
            self.discard(generation).await;
        }
        result
    }

    /// Current channel and its link generation, reconnecting if needed
    async fn channel(&self) -> QueueResult<(Channel, u64)> {
        let mut link = self.link.lock().await;
        if let Some(current) = link.as_ref() {
            if current.channel.status().connected() {
                return Ok((current.channel.clone(), current.generation));
            }
        }

        let connection = connect(&self.config.url, &self.config.name).await?;
        let channel = connection.create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *link = Some(Link {
            connection,
            channel: channel.clone(),
            generation,
        });
        Ok((channel, generation))
    }

    /// Forget the link if it is still the one a publish failed on
    async fn discard(&self, generation: u64) {
        let mut link = self.link.lock().await;
        if link.as_ref().is_some_and(|l| l.generation == generation) {
            if let Some(old) = link.take() {
                if let Err(e) = old.connection.close(200, "reconnecting").await {
                    tracing::debug!(name = %self.config.name, error = %e, "Failed to close stale connection");
                }
            }
        }
    }

    /// Stop accepting publishes, wait for in-flight ones, then close the connection
    pub async fn close(&self) -> QueueResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let _drained = self.gate.write().await;
        tracing::info!(name = %self.config.name, "Producer draining complete, closing connection");

        if let Some(link) = self.link.lock().await.take() {
            if let Err(e) = link.channel.close(200, "producer closed").await {
                tracing::warn!(error = %e, "Failed to close producer channel");
            }
            link.connection.close(200, "producer closed").await?;
        }
        Ok(())
    }
}
