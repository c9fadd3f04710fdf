//! Event router: decodes inbound frames and dispatches them to handlers.
//!
//! Each connection task calls [`dispatch`] serially for its own events, so a
//! handler sees `&mut Session` without further locking. Concurrency comes
//! from many connections dispatching in parallel against the shared managers.

mod message;
mod misc;
mod room;
mod typing;

use crate::error::{HandlerError, HandlerResult};
use crate::proto::{self, Decoded, Inbound, Outbound};
use crate::state::{Relay, Session};
use std::sync::Arc;
use tracing::debug;

/// Handler context: the shared hub plus this connection's session record.
pub struct Context<'a> {
    pub relay: &'a Arc<Relay>,
    pub session: &'a mut Session,
}

impl Context<'_> {
    /// Queue an event to this connection.
    pub fn reply(&self, event: Outbound) {
        self.relay
            .connections
            .try_send(&self.session.conn_id, &event.encode());
    }
}

/// Route one raw inbound frame. Errors map to a generic `ERROR` reply; the
/// connection stays open for everything except transport-level failure.
pub async fn dispatch(relay: &Arc<Relay>, session: &mut Session, raw: &str) -> HandlerResult {
    let event = match proto::decode(raw) {
        Ok(Decoded::Event(event)) => event,
        Ok(Decoded::Ignored) => return Ok(()),
        Err(proto::DecodeError::Malformed) => return Err(HandlerError::Malformed),
        Err(proto::DecodeError::UnknownType(t)) => return Err(HandlerError::UnknownType(t)),
    };

    debug!(
        conn_id = %session.conn_id,
        user_id = %session.identity.id,
        event = ?event,
        "dispatching event"
    );

    let mut ctx = Context { relay, session };
    match event {
        Inbound::Ping => misc::ping(&mut ctx),
        Inbound::JoinRoom { room_id } => room::join_room(&mut ctx, room_id).await,
        Inbound::LeaveRoom => room::leave_room(&mut ctx),
        Inbound::RoomMessage { message } => message::room_message(&mut ctx, message).await,
        Inbound::TypingStart => typing::typing(&mut ctx, true),
        Inbound::TypingStop => typing::typing(&mut ctx, false),
        Inbound::MessageRead { message_id } => message::message_read(&mut ctx, message_id).await,
    }
}
