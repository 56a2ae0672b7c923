//! Session state machine
//!
//! Tracks one connection's lifecycle from transport accept to teardown.
//! Every failure is terminal for the session and resolved by advancing
//! straight to `Leaving`; nothing is retried.

use std::time::Instant;

use crate::connection::ConnId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport accepted, not yet registered in a room
    Connecting,
    /// Registered; topic and history replay queued
    Joined,
    /// Steady state: relaying inbound events
    Relaying,
    /// Deregistering from the room
    Leaving,
    /// Session over
    Closed,
}

/// Complete per-session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id this session drives
    pub conn_id: ConnId,

    /// Room the session is (or was) attached to
    pub room_id: String,

    /// Current phase
    pub phase: SessionPhase,

    /// When the transport was accepted
    pub connected_at: Instant,

    /// Events accepted and relayed
    pub events_relayed: u64,

    /// Malformed frames discarded
    pub events_dropped: u64,
}

impl SessionState {
    /// Create state for a newly accepted connection
    pub fn new(conn_id: ConnId, room_id: impl Into<String>) -> Self {
        Self {
            conn_id,
            room_id: room_id.into(),
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            events_relayed: 0,
            events_dropped: 0,
        }
    }

    /// Registry join succeeded
    pub fn on_joined(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Joined;
        }
    }

    /// Replay delivered; enter the relay loop
    pub fn start_relaying(&mut self) {
        if self.phase == SessionPhase::Joined {
            self.phase = SessionPhase::Relaying;
        }
    }

    /// Channel closed, receive failed, or join/replay failed
    pub fn start_leaving(&mut self) {
        if self.phase != SessionPhase::Closed {
            self.phase = SessionPhase::Leaving;
        }
    }

    /// Deregistration done
    pub fn on_closed(&mut self) {
        if self.phase == SessionPhase::Leaving {
            self.phase = SessionPhase::Closed;
        }
    }

    /// Count one relayed event
    pub fn record_relayed(&mut self) {
        self.events_relayed += 1;
    }

    /// Count one discarded malformed frame
    pub fn record_dropped(&mut self) {
        self.events_dropped += 1;
    }

    /// Whether the session is in its steady state
    pub fn is_relaying(&self) -> bool {
        self.phase == SessionPhase::Relaying
    }

    /// Session duration so far
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
