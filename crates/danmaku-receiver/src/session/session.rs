//! Per-room protocol state
//!
//! A [`Session`] does no socket I/O itself. Outbound frames go through an
//! mpsc channel drained by the driver; inbound socket messages are fed to
//! [`Session::on_message`], which returns the events to forward.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::Instrument;

use super::error::SessionError;
use super::state::SessionState;
use crate::protocol::{decode_bytes, encode, Operation};

const PROTOCOL_VERSION: u8 = 3;
const PLATFORM: &str = "web";
const AUTH_TYPE: u8 = 2;

/// Identity presented in the auth frame
#[derive(Debug, Clone)]
pub struct Credentials {
    pub uid: i64,
    pub buvid: String,
    /// Token from the host lookup
    pub token: String,
}

#[derive(Debug, Serialize)]
struct AuthPayload<'a> {
    uid: i64,
    roomid: i64,
    protover: u8,
    buvid: &'a str,
    platform: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    key: &'a str,
}

/// A frame forwarded to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub operation: Operation,
    /// Raw body text
    pub payload: String,
}

impl DecodedEvent {
    /// Payload parsed as JSON, if it is JSON
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

/// One logical connection to one room
pub struct Session {
    room_id: i64,
    credentials: Credentials,
    heartbeat_interval: Duration,
    outbound: mpsc::Sender<Bytes>,
    state: SessionState,
    heartbeat: Option<JoinHandle<()>>,
    popularity: Option<u32>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("room_id", &self.room_id)
            .field("state", &self.state)
            .field("heartbeating", &self.is_heartbeating())
            .field("popularity", &self.popularity)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session in the `Connecting` state
    #[must_use]
    pub fn new(
        room_id: i64,
        credentials: Credentials,
        heartbeat_interval: Duration,
        outbound: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            room_id,
            credentials,
            heartbeat_interval,
            outbound,
            state: SessionState::Connecting,
            heartbeat: None,
            popularity: None,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last popularity counter reported by a heartbeat reply
    #[must_use]
    pub fn popularity(&self) -> Option<u32> {
        self.popularity
    }

    /// Whether the heartbeat task is running
    #[must_use]
    pub fn is_heartbeating(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Socket opened: send the auth frame and wait for connect-success
    pub async fn on_open(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Authenticating;

        let payload = serde_json::to_string(&AuthPayload {
            uid: self.credentials.uid,
            roomid: self.room_id,
            protover: PROTOCOL_VERSION,
            buvid: &self.credentials.buvid,
            platform: PLATFORM,
            kind: AUTH_TYPE,
            key: &self.credentials.token,
        })?;

        self.outbound
            .send(encode(Operation::Auth, &payload))
            .await
            .map_err(|_| SessionError::OutboundClosed)?;

        tracing::debug!(room_id = self.room_id, "Auth frame sent");
        Ok(())
    }

    /// Decode one socket message and return the events to forward
    ///
    /// Heartbeat replies and connect-success are consumed here. Frames that
    /// follow them in the same message are still processed.
    pub fn on_message(&mut self, data: Bytes) -> Vec<DecodedEvent> {
        let decoded = decode_bytes(data);
        let mut events = Vec::with_capacity(decoded.frames.len());

        for frame in decoded.frames {
            match frame.operation() {
                Operation::HeartbeatReply => {
                    self.popularity = frame.popularity();
                    tracing::trace!(
                        room_id = self.room_id,
                        popularity = ?self.popularity,
                        "Heartbeat reply"
                    );
                }
                Operation::ConnectSuccess => match self.state {
                    SessionState::Closed => {
                        tracing::debug!(room_id = self.room_id, "Connect success after close, ignored");
                    }
                    SessionState::Established => {}
                    SessionState::Connecting | SessionState::Authenticating => {
                        tracing::info!(room_id = self.room_id, body = %frame.text(), "Connected");
                        self.state = SessionState::Established;
                        self.start_heartbeat();
                    }
                },
                operation => events.push(DecodedEvent {
                    operation,
                    payload: frame.text().into_owned(),
                }),
            }
        }

        events
    }

    /// Socket closed: stop heartbeating; safe to call more than once
    pub fn on_close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::debug!(room_id = self.room_id, from = %self.state, "Session closed");
        }
        self.state = SessionState::Closed;
        self.stop_heartbeat();
    }

    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();

        let period = self.heartbeat_interval;
        let outbound = self.outbound.clone();
        let room_id = self.room_id;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task = async move {
            let frame = encode(Operation::Heartbeat, "");
            loop {
                ticker.tick().await;
                if outbound.send(frame.clone()).await.is_err() {
                    break;
                }
                tracing::trace!(room_id, "Heartbeat sent");
            }
        };

        self.heartbeat = Some(tokio::spawn(task.instrument(tracing::Span::current())));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}
