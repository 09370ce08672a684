//! Test fixtures and data generators

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use danmaku_receiver::protocol::{encode, encode_with, Operation, VERSION_BROTLI_V3};
use serde_json::json;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A `DANMU_MSG` packet as sent by the gateway
pub fn danmu_packet(uid: i64, name: &str, content: &str, ts: i64) -> String {
    json!({
        "cmd": "DANMU_MSG",
        "info": [
            [0, 1, 25, 16_777_215, ts * 1000],
            content,
            [uid, name, 0, 0, 0, 10_000, 1, ""],
            [],
            [],
            {},
            {},
            [],
            {},
            {"ts": ts, "ct": "A1B2C3"}
        ]
    })
    .to_string()
}

/// A viewer count packet
pub fn watched_change_packet(num: u64) -> String {
    json!({
        "cmd": "WATCHED_CHANGE",
        "data": {"num": num, "text_small": num.to_string(), "text_large": format!("{num} watched")}
    })
    .to_string()
}

/// Brotli container (version 3) holding one message frame per packet
pub fn compressed_batch(packets: &[String]) -> Vec<u8> {
    let mut inner = Vec::new();
    for packet in packets {
        inner.extend_from_slice(&encode(Operation::Message, packet));
    }

    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
    writer
        .write_all(&inner)
        .expect("writing to a Vec cannot fail");
    let compressed = writer.into_inner();

    // Container bodies are binary; build the frame around raw bytes
    let header = encode_with(Operation::Message, "", VERSION_BROTLI_V3, 0);
    let total = (header.len() + compressed.len()) as u32;

    let mut frame = header.to_vec();
    frame[..4].copy_from_slice(&total.to_be_bytes());
    frame.extend_from_slice(&compressed);
    frame
}
