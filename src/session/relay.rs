//! Session relay driver
//!
//! Orchestrates one connection's join → relay-loop → leave against the room
//! registry. The driver is transport-agnostic: it consumes any stream of
//! inbound text frames, which lets tests drive it over in-process channels
//! while the listener feeds it from a WebSocket.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::connection::ConnectionHandle;
use crate::protocol::event::{EventKind, InboundEvent};
use crate::registry::RoomRegistry;

use super::state::{SessionPhase, SessionState};

/// Failure reported by the transport while receiving
#[derive(Debug)]
pub struct TransportError {
    detail: String,
}

impl TransportError {
    /// Wrap a transport-level receive failure
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport error: {}", self.detail)
    }
}

impl std::error::Error for TransportError {}

/// One connection's session
pub struct Session {
    registry: Arc<RoomRegistry>,
    handle: ConnectionHandle,
    state: SessionState,
}

impl Session {
    /// Create a session for an accepted connection
    pub fn new(
        registry: Arc<RoomRegistry>,
        room_id: impl Into<String>,
        handle: ConnectionHandle,
    ) -> Self {
        let state = SessionState::new(handle.id(), room_id);
        Self {
            registry,
            handle,
            state,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Drive the session to completion
    ///
    /// Joins the room (replay is queued atomically by the registry), then
    /// relays inbound frames until the stream ends or errors, then leaves.
    /// Returns the final session state for the caller's logging.
    pub async fn run<S>(mut self, mut inbound: S) -> SessionState
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        let room_id = self.state.room_id.clone();

        match self.registry.join(&room_id, self.handle.clone()).await {
            Ok(snapshot) => {
                self.state.on_joined();
                tracing::debug!(
                    conn = self.state.conn_id,
                    room = %room_id,
                    topic = %snapshot.topic,
                    replayed = snapshot.replayed,
                    "session joined"
                );
            }
            Err(e) => {
                // Replay failure is an immediate disconnect of this session only
                tracing::debug!(
                    conn = self.state.conn_id,
                    room = %room_id,
                    error = %e,
                    "session ended before relaying"
                );
                self.state.start_leaving();
                self.state.on_closed();
                return self.state;
            }
        }

        self.state.start_relaying();

        while let Some(item) = inbound.next().await {
            match item {
                Ok(text) => self.handle_frame(&room_id, &text).await,
                Err(e) => {
                    tracing::debug!(
                        conn = self.state.conn_id,
                        room = %room_id,
                        error = %e,
                        "receive failed"
                    );
                    break;
                }
            }
        }

        self.state.start_leaving();
        self.registry.leave(&room_id, self.state.conn_id).await;
        self.state.on_closed();

        tracing::debug!(
            conn = self.state.conn_id,
            room = %room_id,
            relayed = self.state.events_relayed,
            dropped = self.state.events_dropped,
            "session closed"
        );

        self.state
    }

    async fn handle_frame(&mut self, room_id: &str, text: &str) {
        let event = match InboundEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                // Malformed input is dropped; the connection stays open
                self.state.record_dropped();
                tracing::warn!(
                    conn = self.state.conn_id,
                    room = %room_id,
                    error = %e,
                    "discarding malformed frame"
                );
                return;
            }
        };

        match event.kind {
            EventKind::GenerateTheme => {
                // The one message type delivered to the sender as well
                if self
                    .registry
                    .regenerate_and_announce(room_id, event.sender)
                    .await
                    .is_none()
                {
                    return;
                }
            }
            _ => {
                self.registry
                    .publish(room_id, event.encode(), Some(self.state.conn_id))
                    .await;
            }
        }
        self.state.record_relayed();
    }
}
