//! Configuration structs

mod app_config;

pub use app_config::{
    AppSettings, BilibiliConfig, BrokerConfig, BrokerInstance, ConfigError, DatabaseConfig,
    Environment, ProcessorConfig, ReceiverConfig, SessionConfig,
};
