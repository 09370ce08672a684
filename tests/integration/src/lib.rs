//! Integration test utilities for the danmaku pipeline
//!
//! Broker-backed tests need a running RabbitMQ reachable at `RABBITMQ_URL`
//! and are `#[ignore]`d by default.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
