//! Room registry: membership, topic, and history replay
//!
//! The registry owns every room's mutable state and routes events between
//! members. Late joiners get the current topic plus the room's bounded
//! history replayed before any live traffic.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<RoomRegistry>
//!                   ┌──────────────────────────┐
//!                   │ rooms: HashMap<RoomId,   │
//!                   │   Room {                 │
//!                   │     members,             │
//!                   │     topic,               │
//!                   │     history: HistoryLog, │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Session A]             [Session B]             [Session C]
//!   publish()               publish()               join() ──► replay
//!        │                       │                       │
//!        └──► append history + handle.send() ──► writer pump ──► WS
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames are `bytes::Bytes`, so fanning one event out to every member and
//! keeping it in history shares a single reference-counted allocation.
//!
//! # Locking Discipline
//!
//! Two-level `RwLock`: the outer lock guards the room map, the inner lock one
//! room. Mutations are single critical sections. Queueing a frame to a member
//! is a non-suspending channel push, so broadcast happens under the room lock
//! and every member's queue holds events in history order; the writer pumps
//! drain the queues outside any lock, so a slow or dead recipient never
//! stalls joins, leaves, or other members.

pub mod config;
pub mod history;
pub mod room;
pub mod store;
pub mod topic;

pub use config::RegistryConfig;
pub use history::HistoryLog;
pub use room::{Room, RoomStats};
pub use store::{JoinError, JoinSnapshot, RoomRegistry};
pub use topic::{draw_theme, THEME_POOL};
