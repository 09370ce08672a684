//! Room status registry
//!
//! Written by the room loops, read for reporting only. Uses `DashMap` so
//! rooms never contend on a single lock.

use std::sync::Arc;

use dashmap::DashMap;

use crate::session::SessionState;

/// Where a room currently is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomStatus {
    /// Waiting for its staggered start
    Pending,
    /// Resolving the gateway host
    LookingUp,
    /// A session is running
    Session(SessionState),
    /// Sleeping before a reconnect
    Waiting,
    /// Host lookup failed; the room is abandoned
    Failed(String),
    /// Stopped by shutdown or with reconnection disabled
    Stopped,
}

impl RoomStatus {
    /// Whether the room loop has exited
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Stopped)
    }
}

/// Concurrent map of room id to status
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<i64, RoomStatus>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Record a room's status
    pub fn set(&self, room_id: i64, status: RoomStatus) {
        tracing::trace!(room_id, status = ?status, "Room status");
        self.rooms.insert(room_id, status);
    }

    #[must_use]
    pub fn get(&self, room_id: i64) -> Option<RoomStatus> {
        self.rooms.get(&room_id).map(|entry| entry.value().clone())
    }

    /// All rooms, sorted by id
    #[must_use]
    pub fn snapshot(&self) -> Vec<(i64, RoomStatus)> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        rooms.sort_by_key(|(room_id, _)| *room_id);
        rooms
    }

    /// Number of rooms with a session in the given state
    #[must_use]
    pub fn count_in(&self, state: SessionState) -> usize {
        self.rooms
            .iter()
            .filter(|entry| *entry.value() == RoomStatus::Session(state))
            .count()
    }

    /// Log how many rooms are established, failed and total
    pub fn log_summary(&self) {
        let failed = self
            .rooms
            .iter()
            .filter(|entry| matches!(entry.value(), RoomStatus::Failed(_)))
            .count();
        tracing::info!(
            rooms = self.len(),
            established = self.count_in(SessionState::Established),
            failed,
            "Room status"
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
