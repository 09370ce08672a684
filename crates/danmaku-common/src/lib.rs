//! # danmaku-common
//!
//! Shared utilities including configuration, error handling, telemetry, and
//! shutdown signal handling.

pub mod config;
pub mod error;
pub mod shutdown;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, BilibiliConfig, BrokerConfig, BrokerInstance, ConfigError, DatabaseConfig,
    Environment, ProcessorConfig, ReceiverConfig, SessionConfig,
};
pub use error::{AppError, AppResult};
pub use shutdown::shutdown_signal;
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
