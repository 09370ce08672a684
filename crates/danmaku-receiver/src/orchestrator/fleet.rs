//! Room loops

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::settings::{stagger_delay, OrchestratorSettings};
use super::status::{RoomRegistry, RoomStatus};
use crate::api::HostLookup;
use crate::session::{run_session, Credentials, SessionEnd, SessionOptions};
use crate::sink::EnvelopeSink;

/// Runs one session loop per room
pub struct Orchestrator<L, K> {
    rooms: Vec<i64>,
    settings: OrchestratorSettings,
    lookup: Arc<L>,
    sink: Arc<K>,
    registry: Arc<RoomRegistry>,
}

impl<L: HostLookup, K: EnvelopeSink> Orchestrator<L, K> {
    #[must_use]
    pub fn new(
        rooms: Vec<i64>,
        settings: OrchestratorSettings,
        lookup: Arc<L>,
        sink: Arc<K>,
    ) -> Self {
        Self {
            rooms,
            settings,
            lookup,
            sink,
            registry: RoomRegistry::new_shared(),
        }
    }

    /// Status registry shared with the room loops
    #[must_use]
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// Spawn on the runtime
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Start every room, then wait until all room loops have exited
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        for &room_id in &self.rooms {
            self.registry.set(room_id, RoomStatus::Pending);
        }
        tracing::info!(rooms = self.rooms.len(), "Starting room sessions");

        let mut loops = JoinSet::new();
        for (index, &room_id) in self.rooms.iter().enumerate() {
            if index > 0 && sleep_or_shutdown(stagger_delay(&self.settings.stagger), &mut shutdown).await {
                break;
            }

            let room = RoomLoop {
                room_id,
                settings: self.settings.clone(),
                lookup: self.lookup.clone(),
                sink: self.sink.clone(),
                registry: self.registry.clone(),
            };
            let span = tracing::info_span!("session", room_id);
            loops.spawn(room.run(shutdown.clone()).instrument(span));
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Room loop panicked");
            }
        }

        // Rooms never started because shutdown arrived during the stagger
        for &room_id in &self.rooms {
            if self.registry.get(room_id) == Some(RoomStatus::Pending) {
                self.registry.set(room_id, RoomStatus::Stopped);
            }
        }
        tracing::info!("All room sessions stopped");
    }
}

struct RoomLoop<L, K> {
    room_id: i64,
    settings: OrchestratorSettings,
    lookup: Arc<L>,
    sink: Arc<K>,
    registry: Arc<RoomRegistry>,
}

impl<L: HostLookup, K: EnvelopeSink> RoomLoop<L, K> {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let room_id = self.room_id;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.registry.set(room_id, RoomStatus::LookingUp);
            let server = match self.lookup.lookup(room_id).await {
                Ok(server) => server,
                Err(e) => {
                    tracing::error!(room_id, error = %e, "Host lookup failed, abandoning room");
                    self.registry.set(room_id, RoomStatus::Failed(e.to_string()));
                    return;
                }
            };

            let options = SessionOptions {
                room_id,
                credentials: Credentials {
                    uid: self.settings.uid,
                    buvid: self.settings.buvid.clone(),
                    token: server.token.clone(),
                },
                heartbeat_interval: self.settings.heartbeat_interval,
            };

            let registry = &self.registry;
            let end = run_session(
                &server.websocket_url(),
                options,
                self.sink.as_ref(),
                &mut shutdown,
                |state| registry.set(room_id, RoomStatus::Session(state)),
            )
            .await;

            match end {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected) => {
                    tracing::warn!(room_id, "Disconnected");
                }
                Err(e) => {
                    tracing::warn!(room_id, error = %e, "Session error");
                }
            }

            let Some(delay) = self.settings.reconnect_delay else {
                break;
            };

            self.registry.set(room_id, RoomStatus::Waiting);
            tracing::info!(room_id, delay_secs = delay.as_secs_f64(), "Reconnecting after delay");
            if sleep_or_shutdown(delay, &mut shutdown).await {
                break;
            }
        }

        self.registry.set(room_id, RoomStatus::Stopped);
    }
}

/// Sleep for `delay`; true if shutdown was requested first
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
