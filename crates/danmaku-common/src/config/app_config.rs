//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).
//! The receiver and processor are deployed separately, so each has its own
//! top-level struct assembled from shared sections.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Configuration for the receiver process (WebSocket sessions + producer)
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub app: AppSettings,
    /// Live rooms to collect, in startup order
    pub rooms: Vec<i64>,
    pub bilibili: BilibiliConfig,
    pub session: SessionConfig,
    pub broker: BrokerConfig,
}

/// Configuration for the processor process (consumers + persistence)
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub app: AppSettings,
    /// Broker instances to consume from; each gets its own connection
    pub brokers: Vec<BrokerInstance>,
    pub prefetch_count: u16,
    /// Deliveries after which a failing message is dead-lettered instead of requeued.
    /// `None` keeps requeueing indefinitely.
    pub max_deliveries: Option<u32>,
    pub database: DatabaseConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Platform account and API settings used for host lookup and authentication
#[derive(Debug, Clone)]
pub struct BilibiliConfig {
    pub api_base: String,
    /// Account uid sent in the auth frame (0 = anonymous)
    pub uid: i64,
    pub buvid: String,
    /// Cookie header sent with host lookup requests
    pub cookie: String,
}

/// Per-room session timing
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    /// Delay before the orchestrator restarts a closed session; `None` disables restarts
    pub reconnect_delay: Option<Duration>,
}

/// Broker settings for the producer side
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub publish_max_attempts: u32,
}

/// One broker instance the processor consumes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerInstance {
    pub url: String,
    pub name: String,
}

/// SQLite database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

// Default value functions
fn default_app_name() -> String {
    "danmaku-collector".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base() -> String {
    "https://api.live.bilibili.com".to_string()
}

fn default_rabbitmq_url() -> String {
    "amqp://localhost".to_string()
}

fn default_brokers() -> Vec<BrokerInstance> {
    vec![BrokerInstance {
        url: default_rabbitmq_url(),
        name: "local".to_string(),
    }]
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_publish_max_attempts() -> u32 {
    2
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_database_url() -> String {
    "sqlite://danmaku.db".to_string()
}

fn default_database_max_connections() -> u32 {
    5
}

/// Environment lookup; tests substitute a map
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn parsed<T: std::str::FromStr>(lookup: Lookup<'_>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

fn json<T: serde::de::DeserializeOwned>(lookup: Lookup<'_>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key, e.to_string())),
        None => Ok(None),
    }
}

impl AppSettings {
    fn load(lookup: Lookup<'_>) -> Self {
        Self {
            name: lookup("APP_NAME").unwrap_or_else(default_app_name),
            env: lookup("APP_ENV")
                .and_then(|s| Environment::parse(&s))
                .unwrap_or_default(),
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `ROOM_ID_LIST` is missing or a value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let rooms: Vec<i64> =
            json(lookup, "ROOM_ID_LIST")?.ok_or(ConfigError::MissingVar("ROOM_ID_LIST"))?;

        let reconnect_secs =
            parsed(lookup, "RECONNECT_DELAY_SECS")?.unwrap_or_else(default_reconnect_delay_secs);

        let publish_max_attempts: u32 =
            parsed(lookup, "PUBLISH_MAX_ATTEMPTS")?.unwrap_or_else(default_publish_max_attempts);
        if publish_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("PUBLISH_MAX_ATTEMPTS", "0".to_string()));
        }

        let heartbeat_secs: u64 = parsed(lookup, "HEARTBEAT_INTERVAL_SECS")?
            .unwrap_or_else(default_heartbeat_interval_secs);
        if heartbeat_secs == 0 {
            return Err(ConfigError::InvalidValue("HEARTBEAT_INTERVAL_SECS", "0".to_string()));
        }

        Ok(Self {
            app: AppSettings::load(lookup),
            rooms,
            bilibili: BilibiliConfig {
                api_base: lookup("BILI_API_BASE").unwrap_or_else(default_api_base),
                uid: parsed(lookup, "BILI_UID")?.unwrap_or(0),
                buvid: lookup("BILI_BUVID").unwrap_or_default(),
                cookie: lookup("BILI_COOKIE").unwrap_or_default(),
            },
            session: SessionConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                reconnect_delay: (reconnect_secs > 0).then(|| Duration::from_secs(reconnect_secs)),
            },
            broker: BrokerConfig {
                url: lookup("RABBITMQ_URL").unwrap_or_else(default_rabbitmq_url),
                publish_max_attempts,
            },
        })
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let brokers: Vec<BrokerInstance> =
            json(lookup, "RABBITMQ_CONFIGS")?.unwrap_or_else(default_brokers);
        if brokers.is_empty() {
            return Err(ConfigError::InvalidValue("RABBITMQ_CONFIGS", "[]".to_string()));
        }

        let max_deliveries: u32 =
            parsed(lookup, "MAX_DELIVERIES")?.unwrap_or_else(default_max_deliveries);

        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("DB_FILE_NAME").map(|file| sqlite_url(&file)))
            .unwrap_or_else(default_database_url);

        Ok(Self {
            app: AppSettings::load(lookup),
            brokers,
            prefetch_count: parsed(lookup, "PREFETCH_COUNT")?.unwrap_or_else(default_prefetch_count),
            max_deliveries: (max_deliveries > 0).then_some(max_deliveries),
            database: DatabaseConfig {
                url: database_url,
                max_connections: parsed(lookup, "DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_database_max_connections),
            },
        })
    }
}

/// `DB_FILE_NAME` may be a bare path or already a URL
fn sqlite_url(file: &str) -> String {
    if file.starts_with("sqlite:") {
        file.to_string()
    } else {
        format!("sqlite://{file}")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
