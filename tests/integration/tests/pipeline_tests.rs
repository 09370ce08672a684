//! End-to-end pipeline without a broker
//!
//! A fake gateway speaks the binary protocol over an in-memory WebSocket; the
//! session's forwarded envelopes go straight into the processor, which writes
//! to an in-memory SQLite database.
//!
//! Run with: cargo test -p integration-tests --test pipeline_tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use danmaku_common::DatabaseConfig;
use danmaku_core::QueueEnvelope;
use danmaku_db::{create_pool, init_schema, SqliteMessageStore};
use danmaku_processor::EnvelopeProcessor;
use danmaku_queue::{Disposition, PublishError};
use danmaku_receiver::protocol::{decode, encode, Operation};
use danmaku_receiver::session::{drive_socket, Credentials, SessionEnd, SessionOptions};
use danmaku_receiver::sink::EnvelopeSink;
use futures_util::{SinkExt, StreamExt};
use integration_tests::{compressed_batch, danmu_packet, watched_change_packet};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const ROOM_ID: i64 = 21_452_505;

/// Runs every envelope through the processor as if it had crossed the broker
struct ProcessingSink {
    processor: EnvelopeProcessor<SqliteMessageStore>,
}

#[async_trait]
impl EnvelopeSink for ProcessingSink {
    async fn publish(&self, envelope: &QueueEnvelope) -> Result<(), PublishError> {
        let body = envelope.to_json()?;
        match self.processor.process(&body).await {
            Disposition::Ack => Ok(()),
            Disposition::Reject { .. } => Err(PublishError::Nacked),
        }
    }
}

async fn memory_store() -> Arc<SqliteMessageStore> {
    let pool = create_pool(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .unwrap();
    init_schema(&pool).await.unwrap();
    Arc::new(SqliteMessageStore::new(pool))
}

#[tokio::test]
async fn test_gateway_frames_are_persisted() {
    let store = memory_store().await;
    let sink = Arc::new(ProcessingSink {
        processor: EnvelopeProcessor::new(store.clone()),
    });

    let (client, server) = tokio::io::duplex(256 * 1024);
    let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
    let mut server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;

    let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let session = {
        let sink = sink.clone();
        tokio::spawn(async move {
            let options = SessionOptions {
                room_id: ROOM_ID,
                credentials: Credentials {
                    uid: 0,
                    buvid: "buvid".to_string(),
                    token: "token".to_string(),
                },
                heartbeat_interval: Duration::from_secs(30),
            };
            drive_socket(client, options, sink.as_ref(), &mut shutdown_rx, |_| {}).await
        })
    };

    // Gateway side: expect auth, accept it, push one compressed batch, hang up
    let auth = loop {
        match server.next().await {
            Some(Ok(Message::Binary(data))) => break data,
            Some(Ok(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    };
    let auth = decode(&auth);
    assert_eq!(auth.frames[0].operation(), Operation::Auth);
    let auth_body: serde_json::Value = serde_json::from_str(&auth.frames[0].text()).unwrap();
    assert_eq!(auth_body["roomid"], ROOM_ID);
    assert_eq!(auth_body["key"], "token");

    server
        .send(Message::Binary(
            encode(Operation::ConnectSuccess, r#"{"code":0}"#).to_vec(),
        ))
        .await
        .unwrap();

    let batch = compressed_batch(&[
        danmu_packet(1001, "alice", "first!", 1_700_000_001),
        watched_change_packet(4242),
        danmu_packet(1002, "bob", "hello", 1_700_000_002),
    ]);
    server.send(Message::Binary(batch)).await.unwrap();
    server.close(None).await.unwrap();

    let end = session.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::Disconnected);

    let raw = store.recent_raw(ROOM_ID, 10).await.unwrap();
    assert_eq!(raw.len(), 3);

    let danmaku = store.recent_danmaku(ROOM_ID, 10).await.unwrap();
    assert_eq!(danmaku.len(), 2);
    // Newest first
    assert_eq!(danmaku[0].sender_name, "bob");
    assert_eq!(danmaku[0].content, "hello");
    assert_eq!(danmaku[0].timestamp, 1_700_000_002);
    assert_eq!(danmaku[1].sender_uid, 1001);
    assert_eq!(danmaku[1].content, "first!");
}

#[tokio::test]
async fn test_invalid_envelope_would_be_dead_lettered() {
    let store = memory_store().await;
    let processor = EnvelopeProcessor::new(store.clone());

    let body = br#"{"roomId":"not-a-number","packet":"{}","timestamp":1}"#;
    assert_eq!(processor.process(body).await, Disposition::DEAD_LETTER);
    assert!(store.recent_raw(0, 10).await.unwrap().is_empty());
}
