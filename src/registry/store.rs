//! Room registry implementation
//!
//! The central registry owning all mutable room state: membership, topic,
//! and history. Everything else in the crate goes through it.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::connection::{ConnId, ConnectionHandle, SendError};
use crate::protocol::event::{self, TopicFrame};

use super::config::RegistryConfig;
use super::room::{Room, RoomStats};

/// What a successful join produced
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    /// The room's current topic (freshly drawn if the room was created)
    pub topic: String,
    /// Number of history frames replayed to the joiner
    pub replayed: usize,
}

/// Error for a join whose replay could not be delivered
///
/// The connection was already dead at join time; the member was not
/// registered and a room created just for it was torn down again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinError;

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection closed before replay completed")
    }
}

impl std::error::Error for JoinError {}

/// Central registry for all active rooms
///
/// Thread-safe via a two-level `RwLock` scheme: the outer lock guards the
/// room map, the inner lock guards one room's state. Every read-modify-write
/// on a room is a single critical section. Queueing a frame to a member is a
/// non-suspending channel push, so delivery happens inside the same critical
/// section as the history append; only eviction of failed members runs
/// outside the lock.
pub struct RoomRegistry {
    /// Map of room id to room state
    rooms: RwLock<HashMap<String, Arc<RwLock<Room>>>>,

    /// Configuration
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a connection in a room, creating the room if absent
    ///
    /// The current topic frame and every stored history frame are queued to
    /// the joining connection inside the same critical section that inserts
    /// it into the member set, so no live broadcast can ever be queued ahead
    /// of replay.
    pub async fn join(
        &self,
        room_id: &str,
        handle: ConnectionHandle,
    ) -> Result<JoinSnapshot, JoinError> {
        let mut rooms = self.rooms.write().await;

        let created = !rooms.contains_key(room_id);
        let room_arc = match rooms.get(room_id) {
            Some(existing) => Arc::clone(existing),
            None => {
                let fresh = Arc::new(RwLock::new(Room::new(&self.config)));
                rooms.insert(room_id.to_owned(), Arc::clone(&fresh));
                fresh
            }
        };
        let mut room = room_arc.write().await;

        let conn_id = handle.id();
        if replay(&room, &handle).is_err() {
            drop(room);
            if created {
                rooms.remove(room_id);
            }
            tracing::warn!(
                room = %room_id,
                conn = conn_id,
                "join aborted: connection closed during replay"
            );
            return Err(JoinError);
        }

        let snapshot = JoinSnapshot {
            topic: room.topic().to_owned(),
            replayed: room.history().len(),
        };
        room.insert_member(handle);

        tracing::info!(
            room = %room_id,
            conn = conn_id,
            members = room.member_count(),
            topic = %snapshot.topic,
            replayed = snapshot.replayed,
            "member joined"
        );

        Ok(snapshot)
    }

    /// Remove a connection from a room
    ///
    /// Tears the room down (topic and history included) when the last member
    /// leaves. Unknown rooms and absent members are a no-op. Returns whether
    /// the member was actually removed.
    pub async fn leave(&self, room_id: &str, conn_id: ConnId) -> bool {
        let mut rooms = self.rooms.write().await;

        let Some(room_arc) = rooms.get(room_id).cloned() else {
            return false;
        };
        let mut room = room_arc.write().await;

        if !room.remove_member(conn_id) {
            return false;
        }

        tracing::info!(
            room = %room_id,
            conn = conn_id,
            members = room.member_count(),
            "member left"
        );

        if room.is_empty() {
            drop(room);
            rooms.remove(room_id);
            tracing::info!(room = %room_id, "room torn down");
        }

        true
    }

    /// Point-in-time copy of a room's member set
    ///
    /// Empty for unknown rooms; never a live-mutable reference.
    pub async fn snapshot_members(&self, room_id: &str) -> Vec<ConnectionHandle> {
        let rooms = self.rooms.read().await;

        match rooms.get(room_id) {
            Some(room_arc) => room_arc.read().await.snapshot_members(),
            None => Vec::new(),
        }
    }

    /// Append a frame to history and deliver it to the room's members
    ///
    /// The append and the queueing to every member happen in one critical
    /// section, so each member's queue holds events in exactly history order
    /// even under concurrent publishers. Queueing never suspends; the writer
    /// pumps drain each queue at their own pace outside any lock. A failed
    /// delivery never aborts the pass; each failing member is evicted after
    /// the lock is released, equivalent to a `leave`. Unknown rooms are a
    /// no-op.
    pub async fn publish(&self, room_id: &str, frame: Bytes, exclude: Option<ConnId>) {
        let failed = {
            let rooms = self.rooms.read().await;
            let Some(room_arc) = rooms.get(room_id).cloned() else {
                return;
            };
            let mut room = room_arc.write().await;
            room.append_history(frame.clone());

            let mut failed = Vec::new();
            for member in room.members() {
                if Some(member.id()) == exclude {
                    continue;
                }
                if member.send(frame.clone()).is_err() {
                    failed.push(member.id());
                }
            }
            failed
        };

        self.evict_failed(room_id, failed).await;
    }

    /// Inject a server-side announcement into a room
    ///
    /// Entry point for external collaborators (e.g. a generation service)
    /// that hold no connection of their own. Delivered to every member, no
    /// exclusion, and recorded into history like any other event.
    pub async fn announce(&self, room_id: &str, value: serde_json::Value) {
        let frame = event::encode_announcement(value);
        self.publish(room_id, frame, None).await;
    }

    /// Current topic of a room, if it exists
    pub async fn current_topic(&self, room_id: &str) -> Option<String> {
        let rooms = self.rooms.read().await;

        let room_arc = rooms.get(room_id)?;
        let topic = room_arc.read().await.topic().to_owned();
        Some(topic)
    }

    /// Redraw a room's topic
    ///
    /// Overwrites the current value with a fresh uniform draw and returns it.
    /// The caller is responsible for publishing the announcement. `None` for
    /// unknown rooms.
    pub async fn regenerate_topic(&self, room_id: &str) -> Option<String> {
        let rooms = self.rooms.read().await;

        let room_arc = rooms.get(room_id)?;
        let mut room = room_arc.write().await;
        let topic = room.regenerate_topic().to_owned();

        tracing::debug!(room = %room_id, topic = %topic, "topic regenerated");
        Some(topic)
    }

    /// Redraw a room's topic and announce it to every member
    ///
    /// The redraw, the history append, and the queueing all happen in one
    /// critical section, so the recorded announcement always names the topic
    /// the room holds, even when regeneration requests race. The announcement
    /// is delivered with no exclusion. Returns the new topic, `None` for
    /// unknown rooms.
    pub async fn regenerate_and_announce(
        &self,
        room_id: &str,
        by: impl Into<String>,
    ) -> Option<String> {
        let (topic, failed) = {
            let rooms = self.rooms.read().await;
            let room_arc = rooms.get(room_id)?;
            let mut room = room_arc.write().await;

            let topic = room.regenerate_topic().to_owned();
            let frame = TopicFrame::regenerated(topic.clone(), by).encode();
            room.append_history(frame.clone());

            let mut failed = Vec::new();
            for member in room.members() {
                if member.send(frame.clone()).is_err() {
                    failed.push(member.id());
                }
            }
            (topic, failed)
        };

        tracing::debug!(room = %room_id, topic = %topic, "topic regenerated and announced");
        self.evict_failed(room_id, failed).await;
        Some(topic)
    }

    async fn evict_failed(&self, room_id: &str, failed: Vec<ConnId>) {
        for conn_id in failed {
            if self.leave(room_id, conn_id).await {
                tracing::warn!(
                    room = %room_id,
                    conn = conn_id,
                    "member evicted after failed delivery"
                );
            }
        }
    }

    /// Ordered copy of a room's history; empty for unknown rooms
    pub async fn history_snapshot(&self, room_id: &str) -> Vec<Bytes> {
        let rooms = self.rooms.read().await;

        match rooms.get(room_id) {
            Some(room_arc) => room_arc.read().await.history().snapshot(),
            None => Vec::new(),
        }
    }

    /// Statistics for one room
    pub async fn room_stats(&self, room_id: &str) -> Option<RoomStats> {
        let rooms = self.rooms.read().await;

        let room_arc = rooms.get(room_id)?;
        let room = room_arc.read().await;
        Some(RoomStats::of(&room))
    }

    /// Total number of live rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn replay(room: &Room, handle: &ConnectionHandle) -> Result<(), SendError> {
    handle.send(TopicFrame::current(room.topic()).encode())?;
    for frame in room.history().iter() {
        handle.send(frame.clone())?;
    }
    Ok(())
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::registry::topic::THEME_POOL;

    use super::*;

    fn decode(frame: Bytes) -> Value {
        serde_json::from_slice(&frame).unwrap()
    }

    async fn must_recv(rx: &mut UnboundedReceiver<Bytes>) -> Value {
        decode(rx.recv().await.expect("expected a frame"))
    }

    #[tokio::test]
    async fn test_join_creates_room_and_replays_topic() {
        let registry = RoomRegistry::new();
        let (handle, mut rx) = ConnectionHandle::new(1);

        let snapshot = registry.join("r1", handle).await.unwrap();
        assert!(THEME_POOL.contains(&snapshot.topic.as_str()));
        assert_eq!(snapshot.replayed, 0);
        assert_eq!(registry.room_count().await, 1);

        let frame = must_recv(&mut rx).await;
        assert_eq!(frame["type"], "topic");
        assert_eq!(frame["value"], snapshot.topic.as_str());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_replays_history_in_order() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();

        registry
            .publish("r1", Bytes::from_static(br#"{"type":"draw","x":1}"#), Some(1))
            .await;
        registry
            .publish("r1", Bytes::from_static(br#"{"type":"draw","x":2}"#), Some(1))
            .await;

        let (b, mut rx_b) = ConnectionHandle::new(2);
        let snapshot = registry.join("r1", b).await.unwrap();
        assert_eq!(snapshot.replayed, 2);

        assert_eq!(must_recv(&mut rx_b).await["type"], "topic");
        assert_eq!(must_recv(&mut rx_b).await["x"], 1);
        assert_eq!(must_recv(&mut rx_b).await["x"], 2);
    }

    #[tokio::test]
    async fn test_join_with_dead_connection_fails_and_leaves_no_room() {
        let registry = RoomRegistry::new();
        let (handle, rx) = ConnectionHandle::new(1);
        drop(rx);

        assert_eq!(registry.join("r1", handle).await.unwrap_err(), JoinError);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_excludes_sender() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::new(1);
        let (b, mut rx_b) = ConnectionHandle::new(2);
        registry.join("r1", a).await.unwrap();
        registry.join("r1", b).await.unwrap();
        must_recv(&mut rx_a).await;
        must_recv(&mut rx_b).await;

        registry
            .publish("r1", Bytes::from_static(br#"{"type":"clear"}"#), Some(1))
            .await;

        assert_eq!(must_recv(&mut rx_b).await["type"], "clear");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::new(1);
        let (b, mut rx_b) = ConnectionHandle::new(2);
        registry.join("r1", a).await.unwrap();
        registry.join("r2", b).await.unwrap();
        must_recv(&mut rx_a).await;
        must_recv(&mut rx_b).await;

        registry
            .publish("r1", Bytes::from_static(br#"{"type":"clear"}"#), None)
            .await;

        assert_eq!(must_recv(&mut rx_a).await["type"], "clear");
        assert!(rx_b.try_recv().is_err());
        assert!(registry.history_snapshot("r2").await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded_fifo() {
        let registry = RoomRegistry::with_config(RegistryConfig::default().max_history(3));
        let (a, _rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();

        for n in 1..=5 {
            let frame = Bytes::from(format!(r#"{{"type":"draw","x":{}}}"#, n));
            registry.publish("r1", frame, Some(1)).await;
        }

        let history = registry.history_snapshot("r1").await;
        assert_eq!(history.len(), 3);
        let xs: Vec<i64> = history
            .into_iter()
            .map(|f| decode(f)["x"].as_i64().unwrap())
            .collect();
        assert_eq!(xs, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_last_leave_tears_down_room() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();
        registry
            .publish("r1", Bytes::from_static(br#"{"type":"draw"}"#), Some(1))
            .await;

        assert!(registry.leave("r1", 1).await);
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(registry.current_topic("r1").await, None);

        // A later join to the same id gets a fresh room
        let (b, _rx_b) = ConnectionHandle::new(2);
        let snapshot = registry.join("r1", b).await.unwrap();
        assert_eq!(snapshot.replayed, 0);
        assert!(registry.history_snapshot("r1").await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_is_idempotent_and_unknown_room_is_noop() {
        let registry = RoomRegistry::new();

        assert!(!registry.leave("nope", 1).await);

        let (a, _rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();
        assert!(!registry.leave("r1", 99).await);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_evicts_only_that_member() {
        let registry = RoomRegistry::new();
        let (a, rx_a) = ConnectionHandle::new(1);
        let (b, mut rx_b) = ConnectionHandle::new(2);
        let (c, mut rx_c) = ConnectionHandle::new(3);
        registry.join("r1", a).await.unwrap();
        registry.join("r1", b).await.unwrap();
        registry.join("r1", c).await.unwrap();
        must_recv(&mut rx_b).await;
        must_recv(&mut rx_c).await;

        // A's transport dies
        drop(rx_a);

        registry
            .publish("r1", Bytes::from_static(br#"{"type":"clear"}"#), None)
            .await;

        // Delivery to the healthy members was not aborted
        assert_eq!(must_recv(&mut rx_b).await["type"], "clear");
        assert_eq!(must_recv(&mut rx_c).await["type"], "clear");

        // The dead member is gone before the next broadcast
        let stats = registry.room_stats("r1").await.unwrap();
        assert_eq!(stats.member_count, 2);
    }

    #[tokio::test]
    async fn test_eviction_of_last_member_tears_down_room() {
        let registry = RoomRegistry::new();
        let (a, rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();
        drop(rx_a);

        registry
            .publish("r1", Bytes::from_static(br#"{"type":"clear"}"#), None)
            .await;

        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_current_topic_matches_join_snapshot() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = ConnectionHandle::new(1);
        let snapshot = registry.join("r1", a).await.unwrap();

        assert_eq!(registry.current_topic("r1").await.unwrap(), snapshot.topic);
        assert_eq!(registry.current_topic("nope").await, None);
    }

    #[tokio::test]
    async fn test_concurrent_publishers_deliver_in_history_order() {
        let registry = Arc::new(RoomRegistry::new());
        let (a, mut rx_a) = ConnectionHandle::new(1);
        let (b, mut rx_b) = ConnectionHandle::new(2);
        registry.join("r1", a).await.unwrap();
        registry.join("r1", b).await.unwrap();
        must_recv(&mut rx_a).await;
        must_recv(&mut rx_b).await;

        let mut publishers = Vec::new();
        for p in 0..4 {
            let registry = Arc::clone(&registry);
            publishers.push(tokio::spawn(async move {
                for n in 0..25 {
                    let frame = Bytes::from(format!(r#"{{"type":"draw","p":{},"n":{}}}"#, p, n));
                    registry.publish("r1", frame, None).await;
                }
            }));
        }
        for publisher in publishers {
            publisher.await.unwrap();
        }

        // Every member's queue holds exactly the history sequence
        let history: Vec<Value> = registry
            .history_snapshot("r1")
            .await
            .into_iter()
            .map(decode)
            .collect();
        assert_eq!(history.len(), 100);
        for rx in [&mut rx_a, &mut rx_b] {
            for want in &history {
                assert_eq!(&must_recv(rx).await, want);
            }
        }
    }

    #[tokio::test]
    async fn test_regenerate_and_announce_records_matching_topic() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();
        must_recv(&mut rx_a).await;

        let topic = registry.regenerate_and_announce("r1", "bob").await.unwrap();

        // The requester is not excluded from the announcement
        let frame = must_recv(&mut rx_a).await;
        assert_eq!(frame["type"], "topic");
        assert_eq!(frame["value"], topic.as_str());
        assert_eq!(frame["by"], "bob");

        // The recorded announcement names the topic the room now holds
        let history = registry.history_snapshot("r1").await;
        let last = decode(history.last().unwrap().clone());
        assert_eq!(
            last["value"],
            registry.current_topic("r1").await.unwrap().as_str()
        );

        assert_eq!(registry.regenerate_and_announce("nope", "bob").await, None);
    }

    #[tokio::test]
    async fn test_regenerate_topic_overwrites() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();

        let topic = registry.regenerate_topic("r1").await.unwrap();
        assert!(THEME_POOL.contains(&topic.as_str()));
        assert_eq!(registry.current_topic("r1").await.unwrap(), topic);

        assert_eq!(registry.regenerate_topic("nope").await, None);
    }

    #[tokio::test]
    async fn test_announce_reaches_all_members_and_history() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::new(1);
        registry.join("r1", a).await.unwrap();
        must_recv(&mut rx_a).await;

        registry
            .announce("r1", json!({"type": "story", "text": "once upon a time"}))
            .await;

        let frame = must_recv(&mut rx_a).await;
        assert_eq!(frame["type"], "story");
        assert_eq!(registry.history_snapshot("r1").await.len(), 1);

        // Unknown room: successful no-op
        registry.announce("nope", json!({"type": "story"})).await;
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_members_unknown_room_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.snapshot_members("nope").await.is_empty());
    }
}
