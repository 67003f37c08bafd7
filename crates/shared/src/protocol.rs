//! Channel protocol definitions: frame codec and inbound event decoding.
//!
//! The backend speaks the Phoenix Channels v1 JSON protocol. Every WebSocket
//! text message is one [`ChannelFrame`]:
//!
//! ```text
//! { "topic": "user:42", "event": "change", "payload": {...}, "ref": null }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeError, FrameError};
use crate::models::Message;

/// Reserved event names
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// Topic used for socket-level traffic such as heartbeats
pub const SOCKET_TOPIC: &str = "phoenix";

/// Channel event that carries object changes for the user
pub const EVENT_CHANGE: &str = "change";

/// Object type tag for chat messages inside a change event
pub const OBJECT_TYPE_MESSAGE: &str = "MESSAGE";

/// Query parameter carrying the session token on the socket URL
pub const SESSION_TOKEN_PARAM: &str = "session_token";

/// One frame on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelFrame {
    pub topic: String,
    pub event: String,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

impl ChannelFrame {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference: None,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Join request for a channel topic.
    pub fn join(topic: &str, reference: &str) -> Self {
        Self::new(topic, EVENT_JOIN, empty_payload()).with_ref(reference)
    }

    /// Socket heartbeat.
    pub fn heartbeat(reference: &str) -> Self {
        Self::new(SOCKET_TOPIC, EVENT_HEARTBEAT, empty_payload()).with_ref(reference)
    }

    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the server dropped the channel this frame belongs to.
    pub fn is_channel_failure(&self) -> bool {
        self.event == EVENT_ERROR || self.event == EVENT_CLOSE
    }

    /// Interpret a `phx_reply` payload. Returns `None` for any other event.
    pub fn reply(&self) -> Option<Reply> {
        if self.event != EVENT_REPLY {
            return None;
        }
        let status = match self.payload.get("status").and_then(Value::as_str) {
            Some("ok") => ReplyStatus::Ok,
            Some(other) => ReplyStatus::Error(other.to_string()),
            None => ReplyStatus::Error("missing status".to_string()),
        };
        Some(Reply {
            status,
            response: self.payload.get("response").cloned().unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyStatus {
    Ok,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub response: Value,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}

// --- Inbound decode ---

/// A channel event, classified by name.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `"change"`: an object changed for this user
    Change(Value),
    /// Any other event name; ignored by the client
    Other(String),
}

impl InboundEvent {
    pub fn from_frame(frame: ChannelFrame) -> Self {
        if frame.event == EVENT_CHANGE {
            InboundEvent::Change(frame.payload)
        } else {
            InboundEvent::Other(frame.event)
        }
    }
}

/// Result of decoding a change payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Message(Message),
    /// Object type the client does not understand yet (or no type at all)
    Unsupported { kind: Option<String> },
}

/// Decode a `"change"` payload.
///
/// Steps run in order and stop at the first failure:
/// 1. payload has a `body` object
/// 2. `body` has an `object` object and a `data` object
/// 3. `object.type` is `"MESSAGE"`, otherwise the change is [`ChangeEvent::Unsupported`]
/// 4. `data` decodes into a [`Message`]
pub fn decode_change(payload: &Value) -> Result<ChangeEvent, DecodeError> {
    let body = payload
        .get("body")
        .and_then(Value::as_object)
        .ok_or(DecodeError::MissingBody)?;

    let object = body
        .get("object")
        .and_then(Value::as_object)
        .ok_or(DecodeError::MissingObject)?;
    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or(DecodeError::MissingData)?;

    match object.get("type").and_then(Value::as_str) {
        Some(OBJECT_TYPE_MESSAGE) => {}
        kind => {
            return Ok(ChangeEvent::Unsupported {
                kind: kind.map(str::to_string),
            })
        }
    }

    let message = Message::deserialize(data).map_err(DecodeError::Message)?;
    Ok(ChangeEvent::Message(message))
}
