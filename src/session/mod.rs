//! Per-connection session lifecycle
//!
//! One session per client connection: join the room, replay, relay inbound
//! events, leave on disconnect. Failures never propagate beyond the one
//! session they occur in.

pub mod relay;
pub mod state;

pub use relay::{Session, TransportError};
pub use state::{SessionPhase, SessionState};
