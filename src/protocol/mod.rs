//! Wire protocol types
//!
//! One JSON object per WebSocket text frame. The broker only interprets the
//! `type` discriminator and the `sender` attribution; everything else passes
//! through untouched.

pub mod event;

pub use event::{DecodeError, EventKind, InboundEvent, TopicFrame};
