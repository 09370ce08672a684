//! Test helpers for integration tests
//!
//! Broker connections, per-test topologies with unique names, and handlers
//! that hand deliveries back to the test.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use danmaku_queue::{connect, DeliveryHandler, Disposition, Topology};
use lapin::options::{ExchangeDeleteOptions, QueueDeleteOptions};
use tokio::sync::mpsc;

/// Broker URL for live tests
pub fn broker_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("RABBITMQ_URL").unwrap_or_else(|_| "amqp://localhost".to_string())
}

/// Topology with names unique to one test
pub fn unique_topology() -> Topology {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Topology::for_names(
        &format!("test-events-{suffix}"),
        &format!("test_messages_{suffix}"),
    )
}

/// Remove everything a test topology declared
pub async fn delete_topology(url: &str, topology: &Topology) -> Result<()> {
    let connection = connect(url, "test-cleanup").await?;
    let channel = connection.create_channel().await?;

    for queue in &topology.queues {
        channel
            .queue_delete(&queue.name, QueueDeleteOptions::default())
            .await?;
    }
    for exchange in &topology.exchanges {
        channel
            .exchange_delete(&exchange.name, ExchangeDeleteOptions::default())
            .await?;
    }

    connection.close(200, "cleanup").await?;
    Ok(())
}

/// Forwards every body to a channel and answers with a fixed disposition
pub struct ForwardingHandler {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    disposition: Disposition,
}

impl ForwardingHandler {
    pub fn new(disposition: Disposition) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                disposition,
            },
            receiver,
        )
    }
}

#[async_trait]
impl DeliveryHandler for ForwardingHandler {
    async fn handle(&self, body: &[u8]) -> Disposition {
        let _ = self.sender.send(body.to_vec());
        self.disposition
    }
}

/// Receive with a timeout so a broken pipeline fails instead of hanging
pub async fn recv_within<T>(
    receiver: &mut mpsc::UnboundedReceiver<T>,
    timeout: Duration,
) -> Option<T> {
    tokio::time::timeout(timeout, receiver.recv())
        .await
        .ok()
        .flatten()
}
