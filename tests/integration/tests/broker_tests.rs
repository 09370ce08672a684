//! Live broker tests
//!
//! These tests require a running RabbitMQ instance at `RABBITMQ_URL`
//! (default `amqp://localhost`). Each test declares its own uniquely named
//! topology and deletes it afterwards.
//!
//! Run with: cargo test -p integration-tests --test broker_tests -- --ignored

use std::sync::Arc;
use std::time::Duration;

use danmaku_core::QueueEnvelope;
use danmaku_queue::{
    connect, Consumer, ConsumerConfig, Disposition, Producer, ProducerConfig, QueueError, Topology,
};
use integration_tests::{
    broker_url, danmu_packet, delete_topology, recv_within, unique_topology, ForwardingHandler,
};
use lapin::options::{BasicGetOptions, QueueDeclareOptions, QueueDeleteOptions};
use lapin::types::FieldTable;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(10);

fn producer_config(url: &str) -> ProducerConfig {
    ProducerConfig {
        url: url.to_string(),
        name: "test-producer".to_string(),
        max_attempts: 2,
    }
}

fn consumer_config(url: &str) -> ConsumerConfig {
    ConsumerConfig {
        url: url.to_string(),
        name: "test-consumer".to_string(),
        prefetch_count: 10,
        max_deliveries: Some(5),
        reconnect_delay: Duration::from_secs(1),
    }
}

// ============================================================================
// Topology
// ============================================================================

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_topology_declared_twice() {
    let url = broker_url();
    let topology = unique_topology();

    let connection = connect(&url, "topology-test").await.unwrap();
    let first = connection.create_channel().await.unwrap();
    let second = connection.create_channel().await.unwrap();

    topology.declare(&first).await.unwrap();
    topology.declare(&second).await.unwrap();

    connection.close(200, "done").await.unwrap();
    delete_topology(&url, &topology).await.unwrap();
}

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_topology_declared_concurrently() {
    let url = broker_url();
    let topology = unique_topology();

    let a = connect(&url, "topology-a").await.unwrap();
    let b = connect(&url, "topology-b").await.unwrap();
    let (ca, cb) = (
        a.create_channel().await.unwrap(),
        b.create_channel().await.unwrap(),
    );

    let (ra, rb) = tokio::join!(topology.declare(&ca), topology.declare(&cb));
    ra.unwrap();
    rb.unwrap();

    let _ = a.close(200, "done").await;
    let _ = b.close(200, "done").await;
    delete_topology(&url, &topology).await.unwrap();
}

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_consumer_start_fails_on_conflicting_queue() {
    let url = broker_url();
    let topology = unique_topology();

    // Same name, no dead-letter arguments
    let connection = connect(&url, "conflict-setup").await.unwrap();
    let channel = connection.create_channel().await.unwrap();
    channel
        .queue_declare(
            topology.queue(),
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .unwrap();

    let (handler, _received) = ForwardingHandler::new(Disposition::Ack);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let err = Consumer::new(consumer_config(&url), topology.clone(), Arc::new(handler))
        .start(shutdown_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Amqp(_)));

    let cleanup = connection.create_channel().await.unwrap();
    let _ = cleanup
        .queue_delete(topology.queue(), QueueDeleteOptions::default())
        .await;
    let _ = connection.close(200, "done").await;
    let _ = delete_topology(&url, &topology).await;
}

// ============================================================================
// Publish / consume
// ============================================================================

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_publish_and_consume_round_trip() {
    let url = broker_url();
    let topology = unique_topology();

    let producer = Producer::connect(producer_config(&url), topology.clone())
        .await
        .unwrap();
    producer.declare_topology().await.unwrap();

    let (handler, mut received) = ForwardingHandler::new(Disposition::Ack);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = Consumer::new(consumer_config(&url), topology.clone(), Arc::new(handler))
        .start(shutdown_rx)
        .await
        .unwrap();

    let envelope = QueueEnvelope::new(35_298, danmu_packet(1, "alice", "hi", 1_700_000_000));
    producer.publish(&envelope).await.unwrap();

    let body = recv_within(&mut received, WAIT).await.expect("no delivery");
    assert_eq!(QueueEnvelope::from_wire(&body).unwrap(), envelope);

    shutdown_tx.send(true).unwrap();
    consumer.await.unwrap();
    producer.close().await.unwrap();
    delete_topology(&url, &topology).await.unwrap();
}

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_rejected_delivery_is_dead_lettered() {
    let url = broker_url();
    let topology = unique_topology();

    let producer = Producer::connect(producer_config(&url), topology.clone())
        .await
        .unwrap();
    producer.declare_topology().await.unwrap();

    let (handler, mut received) = ForwardingHandler::new(Disposition::DEAD_LETTER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = Consumer::new(consumer_config(&url), topology.clone(), Arc::new(handler))
        .start(shutdown_rx)
        .await
        .unwrap();

    let envelope = QueueEnvelope::new(1, "{}");
    producer.publish(&envelope).await.unwrap();
    recv_within(&mut received, WAIT).await.expect("no delivery");

    shutdown_tx.send(true).unwrap();
    consumer.await.unwrap();

    // The failed queue is the second queue of the topology
    let failed_queue = &topology.queues[1].name;
    let connection = connect(&url, "dlq-reader").await.unwrap();
    let channel = connection.create_channel().await.unwrap();

    let mut dead = None;
    for _ in 0..50 {
        dead = channel
            .basic_get(failed_queue, BasicGetOptions { no_ack: true })
            .await
            .unwrap();
        if dead.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let dead = dead.expect("message did not reach the failed queue");
    assert_eq!(QueueEnvelope::from_wire(&dead.delivery.data).unwrap(), envelope);

    let _ = connection.close(200, "done").await;
    producer.close().await.unwrap();
    delete_topology(&url, &topology).await.unwrap();
}

#[tokio::test]
#[ignore = "requires RabbitMQ"]
async fn test_producer_close_rejects_new_publishes() {
    let url = broker_url();
    let producer = Producer::connect(producer_config(&url), Topology::default())
        .await
        .unwrap();

    producer.close().await.unwrap();
    assert!(producer.publish(&QueueEnvelope::new(1, "{}")).await.is_err());
}
