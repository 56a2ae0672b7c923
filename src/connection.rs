//! Outbound connection handle
//!
//! The registry never talks to a socket directly. Each client connection is
//! represented by a `ConnectionHandle`: the sending half of an unbounded
//! channel whose receiving half is drained by the transport layer's writer
//! task. When the transport goes away (socket closed or errored) the receiver
//! is dropped and every subsequent `send` fails, which is what drives lazy
//! eviction in the registry.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Unique identifier for one client connection.
///
/// Allocated by the listener; two handles refer to the same underlying
/// channel iff their ids are equal.
pub type ConnId = u64;

/// Error returned when the transport side of a connection is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError;

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection closed")
    }
}

impl std::error::Error for SendError {}

/// Outbound half of one client connection
///
/// Cheap to clone; all clones share the same queue and id. Frames are
/// reference-counted `Bytes`, so fanning the same frame out to many members
/// never copies the payload.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnId,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver the transport pump drains
    pub fn new(id: ConnId) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// Connection id
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queue a frame for delivery
    ///
    /// Fails only when the transport has dropped the receiving half. Queueing
    /// never blocks; backpressure is the transport's concern, not the
    /// registry's.
    pub fn send(&self, frame: Bytes) -> Result<(), SendError> {
        self.tx.send(frame).map_err(|_| SendError)
    }

    /// Whether the transport side is still attached
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
