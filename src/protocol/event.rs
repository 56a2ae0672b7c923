//! Event decoding and frame construction
//!
//! Inbound frames are untyped JSON objects. The broker classifies them by
//! their `type` field, fills in the default `sender` attribution, and
//! otherwise relays the payload verbatim. Unknown discriminators are still
//! relayed and stored; only `generateTheme` is consumed by the broker itself.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

/// Discriminator values the broker special-cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Drawing stroke data, relayed excluding the sender
    Draw,
    /// Canvas clear, relayed excluding the sender
    Clear,
    /// Request for a new room topic; consumed, never relayed itself
    GenerateTheme,
    /// Topic announcement (normally server-synthesized)
    Topic,
    /// Anything else: relayed and stored verbatim
    Other,
}

impl EventKind {
    fn classify(discriminator: Option<&str>) -> Self {
        match discriminator {
            Some("draw") => EventKind::Draw,
            Some("clear") => EventKind::Clear,
            Some("generateTheme") => EventKind::GenerateTheme,
            Some("topic") => EventKind::Topic,
            _ => EventKind::Other,
        }
    }
}

/// Error for frames that cannot be interpreted as a JSON object
#[derive(Debug)]
pub enum DecodeError {
    /// Not well-formed JSON
    Json(serde_json::Error),
    /// Well-formed JSON but not an object
    NotAnObject,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid JSON: {}", e),
            DecodeError::NotAnObject => write!(f, "frame is not a JSON object"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::NotAnObject => None,
        }
    }
}

/// One decoded inbound event
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Classified discriminator
    pub kind: EventKind,
    /// Sender attribution, `"anon"` when absent or empty
    pub sender: String,
    payload: Map<String, Value>,
}

impl InboundEvent {
    /// Decode one text frame
    ///
    /// The returned event carries the original payload with `sender`
    /// normalized, so `encode` relays exactly what came in.
    pub fn decode(text: &str) -> Result<InboundEvent, DecodeError> {
        let value: Value = serde_json::from_str(text).map_err(DecodeError::Json)?;
        let Value::Object(mut payload) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let kind = EventKind::classify(payload.get("type").and_then(Value::as_str));
        let sender = match payload.get("sender").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_owned(),
            _ => "anon".to_owned(),
        };
        payload.insert("sender".to_owned(), Value::String(sender.clone()));

        Ok(InboundEvent {
            kind,
            sender,
            payload,
        })
    }

    /// Serialize the event for relay and history storage
    pub fn encode(&self) -> Bytes {
        to_bytes(&self.payload)
    }
}

/// Server-synthesized topic announcement
///
/// Sent once on join (current topic, no attribution) and on every topic
/// regeneration (attributed to the requesting sender).
#[derive(Debug, Clone, Serialize)]
pub struct TopicFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    by: Option<String>,
}

impl TopicFrame {
    /// Frame announcing the current topic to a new joiner
    pub fn current(value: impl Into<String>) -> Self {
        Self {
            kind: "topic",
            value: value.into(),
            by: None,
        }
    }

    /// Frame announcing a regenerated topic, attributed to its requester
    pub fn regenerated(value: impl Into<String>, by: impl Into<String>) -> Self {
        Self {
            kind: "topic",
            value: value.into(),
            by: Some(by.into()),
        }
    }

    /// Serialize for broadcast
    pub fn encode(&self) -> Bytes {
        to_bytes(self)
    }
}

/// Serialize an external announcement payload for broadcast
///
/// Entry point for collaborator services injecting a frame without holding a
/// connection. Non-object payloads are wrapped so every frame on the wire
/// stays an object.
pub fn encode_announcement(value: Value) -> Bytes {
    match value {
        Value::Object(_) => to_bytes(&value),
        other => to_bytes(&serde_json::json!({ "type": "announce", "value": other })),
    }
}

fn to_bytes(value: &impl Serialize) -> Bytes {
    // Serializing string-keyed JSON values cannot fail.
    Bytes::from(serde_json::to_vec(value).expect("JSON value serialization"))
}
