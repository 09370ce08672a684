//! Orchestrator settings

use std::ops::Range;
use std::time::Duration;

use danmaku_common::ReceiverConfig;
use rand::Rng;

/// Delay range between consecutive room starts
pub const DEFAULT_STAGGER: Range<Duration> = Duration::from_millis(1000)..Duration::from_millis(1500);

/// Settings shared by every room loop
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub uid: i64,
    pub buvid: String,
    pub heartbeat_interval: Duration,
    /// `None` stops a room after its first session ends
    pub reconnect_delay: Option<Duration>,
    /// Random delay range between room starts
    pub stagger: Range<Duration>,
}

impl From<&ReceiverConfig> for OrchestratorSettings {
    fn from(config: &ReceiverConfig) -> Self {
        Self {
            uid: config.bilibili.uid,
            buvid: config.bilibili.buvid.clone(),
            heartbeat_interval: config.session.heartbeat_interval,
            reconnect_delay: config.session.reconnect_delay,
            stagger: DEFAULT_STAGGER,
        }
    }
}

/// Pick a start delay from `range`; an empty range yields its start
#[must_use]
pub fn stagger_delay(range: &Range<Duration>) -> Duration {
    if range.start >= range.end {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}
