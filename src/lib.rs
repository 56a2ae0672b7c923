//! Collaborative room session broker
//!
//! `roomcast` keeps groups of WebSocket clients ("rooms") synchronized: it
//! relays drawing and state-change events to every other participant, replays
//! recent history to late joiners, and tracks a per-room topic drawn from a
//! fixed theme pool.
//!
//! # Architecture
//!
//! - [`registry`]: owns all mutable room state (membership, topic, bounded
//!   history). Appending to history and queueing to members happen in one
//!   critical section, so every member observes events in history order.
//! - [`session`]: one task per connection driving the join, relay loop, and
//!   leave sequence.
//! - [`protocol`]: JSON frame decode, classify, and encode. Only the `type`
//!   discriminator is interpreted; unknown types are relayed verbatim.
//! - [`server`]: `TcpListener` accept loop, `/ws/{room}` upgrade, and a
//!   writer pump per connection.
//! - [`connection`]: the outbound handle the registry holds per member.
//!   Send failure is the only liveness signal and triggers lazy eviction.
//!
//! # Example
//!
//! ```ignore
//! use roomcast::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> roomcast::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use connection::{ConnId, ConnectionHandle, SendError};
pub use error::{Error, Result};
pub use protocol::{DecodeError, EventKind, InboundEvent, TopicFrame};
pub use registry::{
    HistoryLog, JoinError, JoinSnapshot, RegistryConfig, RoomRegistry, RoomStats,
};
pub use server::{RelayServer, ServerConfig};
pub use session::{Session, SessionPhase, SessionState, TransportError};
