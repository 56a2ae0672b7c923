//! Per-room state
//!
//! One `Room` holds everything a room owns: the live member set, the current
//! topic, and the bounded history log. A room only exists while it has
//! members; the registry tears it down the moment the last one leaves.

use std::collections::HashMap;

use bytes::Bytes;

use crate::connection::{ConnId, ConnectionHandle};
use crate::registry::config::RegistryConfig;
use crate::registry::history::HistoryLog;
use crate::registry::topic;

/// State for a single room in the registry
pub struct Room {
    members: HashMap<ConnId, ConnectionHandle>,
    topic: String,
    history: HistoryLog,
}

impl Room {
    /// Create an empty room with a freshly drawn topic
    pub(super) fn new(config: &RegistryConfig) -> Self {
        Self {
            members: HashMap::new(),
            topic: topic::draw_theme().to_owned(),
            history: HistoryLog::new(config.max_history),
        }
    }

    /// Current topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Overwrite the topic with a fresh uniform draw
    pub(super) fn regenerate_topic(&mut self) -> &str {
        self.topic = topic::draw_theme().to_owned();
        &self.topic
    }

    /// Register a member
    pub(super) fn insert_member(&mut self, handle: ConnectionHandle) {
        self.members.insert(handle.id(), handle);
    }

    /// Remove a member; returns true if it was present
    pub(super) fn remove_member(&mut self, id: ConnId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Number of live members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members left
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate the live member handles
    pub(super) fn members(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.members.values()
    }

    /// Point-in-time copy of the member set
    pub(super) fn snapshot_members(&self) -> Vec<ConnectionHandle> {
        self.members.values().cloned().collect()
    }

    /// Append a frame to the history log
    pub(super) fn append_history(&mut self, frame: Bytes) {
        self.history.push(frame);
    }

    /// Borrow the history log
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }
}

/// Statistics for one room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Number of live members
    pub member_count: usize,
    /// Current topic
    pub topic: String,
    /// Number of stored history entries
    pub history_len: usize,
}

impl RoomStats {
    pub(super) fn of(room: &Room) -> Self {
        Self {
            member_count: room.member_count(),
            topic: room.topic.clone(),
            history_len: room.history.len(),
        }
    }
}
