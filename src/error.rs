//! Unified error handling for the relay.
//!
//! Event handler failures map onto a small taxonomy: some produce a generic
//! `ERROR` event for the client, the rest are logged and the connection stays
//! open. Nothing here is fatal to the process.

use crate::proto::Outbound;
use thiserror::Error;

/// Errors that can occur while routing an inbound client event.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The frame was not a parseable event envelope.
    #[error("invalid JSON message")]
    Malformed,

    /// The envelope carried an event type we do not recognize.
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// Something unexpected went wrong inside a handler. The client only
    /// ever sees a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Static error code for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed_event",
            Self::UnknownType(_) => "unknown_event_type",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Convert to a client-visible `ERROR` event.
    ///
    /// Internal detail is never surfaced; the client gets a fixed string.
    pub fn to_client_reply(&self) -> Option<Outbound> {
        let message = match self {
            Self::Malformed => "Invalid JSON message",
            Self::UnknownType(_) => "Unknown event type",
            Self::Internal(_) => "Internal server error",
        };
        Some(Outbound::Error {
            message: message.to_string(),
        })
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;
