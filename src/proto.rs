//! Wire protocol: JSON event envelopes exchanged with clients.
//!
//! Every frame is `{type, payload, meta?}`. Inbound frames are decoded in two
//! steps: the envelope first, then the payload for the recognized type. A
//! frame that is not valid JSON is a malformed event; a valid envelope with an
//! unrecognized `type` is an unknown event; a recognized type whose payload is
//! missing required fields is dropped silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Envelope metadata attached to outbound frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Meta {
    /// Milliseconds since the Unix epoch, server clock.
    pub timestamp: i64,
}

/// Raw inbound envelope. Payload decoding is deferred until the type is known.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decode failures that warrant a client-visible `ERROR` reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON message")]
    Malformed,
    #[error("unknown event type: {0}")]
    UnknownType(String),
}

/// A recognized inbound client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Ping,
    JoinRoom { room_id: String },
    LeaveRoom,
    RoomMessage { message: String },
    TypingStart,
    TypingStop,
    MessageRead { message_id: String },
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(Inbound),
    /// Envelope was fine but unusable: no `type`, or a recognized type with a
    /// payload missing required fields. Dropped without a reply.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct JoinRoomPayload {
    #[serde(rename = "roomId")]
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct RoomMessagePayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageReadPayload {
    #[serde(rename = "messageId")]
    message_id: String,
}

/// Decode a raw text frame into an inbound event.
pub fn decode(raw: &str) -> Result<Decoded, DecodeError> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(|_| DecodeError::Malformed)?;
    let Some(kind) = envelope.kind else {
        return Ok(Decoded::Ignored);
    };

    let event = match kind.as_str() {
        "PING" => Inbound::Ping,
        "LEAVE_ROOM" => Inbound::LeaveRoom,
        "TYPING_START" => Inbound::TypingStart,
        "TYPING_STOP" => Inbound::TypingStop,
        "JOIN_ROOM" => {
            match serde_json::from_value::<JoinRoomPayload>(envelope.payload) {
                Ok(p) if !p.room_id.is_empty() => Inbound::JoinRoom { room_id: p.room_id },
                _ => return Ok(Decoded::Ignored),
            }
        }
        "ROOM_MESSAGE" => match serde_json::from_value::<RoomMessagePayload>(envelope.payload) {
            Ok(p) => Inbound::RoomMessage { message: p.message },
            Err(_) => return Ok(Decoded::Ignored),
        },
        "MESSAGE_READ" => match serde_json::from_value::<MessageReadPayload>(envelope.payload) {
            Ok(p) if !p.message_id.is_empty() => Inbound::MessageRead {
                message_id: p.message_id,
            },
            _ => return Ok(Decoded::Ignored),
        },
        other => return Err(DecodeError::UnknownType(other.to_string())),
    };

    Ok(Decoded::Event(event))
}

/// Online/offline presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// A chat message as delivered to clients (and from the history API).
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub id: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "senderEmail")]
    pub sender_email: Option<String>,
    #[serde(rename = "senderName")]
    pub sender_name: Option<String>,
    pub content: String,
    /// RFC 3339 server-assigned creation time.
    pub created_at: String,
    /// Same instant as milliseconds since epoch, for client convenience.
    pub timestamp: i64,
}

impl MessageEvent {
    pub fn new(
        id: String,
        room_id: String,
        sender_id: String,
        sender_email: Option<String>,
        sender_name: Option<String>,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id,
            sender_email,
            sender_name,
            content,
            created_at: created_at.to_rfc3339(),
            timestamp: created_at.timestamp_millis(),
        }
    }
}

/// Outbound server events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Outbound {
    #[serde(rename = "PONG")]
    Pong {},
    #[serde(rename = "JOINED_ROOM")]
    JoinedRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "USER_JOINED")]
    UserJoined {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "USER_LEFT")]
    UserLeft {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "ROOM_MESSAGE")]
    RoomMessage(MessageEvent),
    #[serde(rename = "USER_TYPING")]
    UserTyping {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        typing: bool,
    },
    #[serde(rename = "USER_STATUS")]
    UserStatus {
        #[serde(rename = "userId")]
        user_id: String,
        status: PresenceStatus,
    },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(flatten)]
    event: &'a Outbound,
    meta: Meta,
}

/// A serialized outbound frame, shared across recipients.
pub type Frame = Arc<str>;

impl Outbound {
    /// Serialize once for fan-out. Every recipient gets the identical bytes.
    pub fn encode(&self) -> Frame {
        let frame = OutboundFrame {
            event: self,
            meta: Meta {
                timestamp: Utc::now().timestamp_millis(),
            },
        };
        match serde_json::to_string(&frame) {
            Ok(s) => Arc::from(s),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound event");
                Arc::from(r#"{"type":"ERROR","payload":{"message":"Internal server error"}}"#)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ping() {
        let decoded = decode(r#"{"type":"PING","payload":{}}"#).unwrap();
        assert_eq!(decoded, Decoded::Event(Inbound::Ping));
    }

    #[test]
    fn test_decode_join_room() {
        let decoded = decode(r#"{"type":"JOIN_ROOM","payload":{"roomId":"r1"}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Event(Inbound::JoinRoom {
                room_id: "r1".into()
            })
        );
    }

    #[test]
    fn test_decode_room_message() {
        let decoded = decode(r#"{"type":"ROOM_MESSAGE","payload":{"message":"hi"}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Event(Inbound::RoomMessage {
                message: "hi".into()
            })
        );
    }

    #[test]
    fn test_decode_message_read() {
        let decoded = decode(r#"{"type":"MESSAGE_READ","payload":{"messageId":"m1"}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Event(Inbound::MessageRead {
                message_id: "m1".into()
            })
        );
    }

    #[test]
    fn test_malformed_frame() {
        assert_eq!(decode("{not json").unwrap_err(), DecodeError::Malformed);
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            decode(r#"{"type":"TELEPORT","payload":{}}"#).unwrap_err(),
            DecodeError::UnknownType("TELEPORT".into())
        );
    }

    #[test]
    fn test_untyped_frame_is_dropped() {
        assert_eq!(decode(r#"{"payload":{}}"#).unwrap(), Decoded::Ignored);
    }

    #[test]
    fn test_missing_payload_fields_are_dropped() {
        assert_eq!(
            decode(r#"{"type":"JOIN_ROOM","payload":{}}"#).unwrap(),
            Decoded::Ignored
        );
        assert_eq!(
            decode(r#"{"type":"MESSAGE_READ","payload":{"messageId":""}}"#).unwrap(),
            Decoded::Ignored
        );
    }

    #[test]
    fn test_encode_envelope_shape() {
        let frame = Outbound::JoinedRoom {
            room_id: "r1".into(),
        }
        .encode();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["type"], "JOINED_ROOM");
        assert_eq!(v["payload"]["roomId"], "r1");
        assert!(v["meta"]["timestamp"].is_i64());
    }

    #[test]
    fn test_encode_user_status() {
        let frame = Outbound::UserStatus {
            user_id: "u1".into(),
            status: PresenceStatus::Offline,
        }
        .encode();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["type"], "USER_STATUS");
        assert_eq!(v["payload"]["status"], "offline");
    }
}
