//! Typing indicator handlers.

use super::Context;
use crate::error::HandlerResult;
use crate::proto::Outbound;

/// `TYPING_START` / `TYPING_STOP`: relay to the room, excluding the sender.
/// Not persisted; a no-op outside a room.
pub fn typing(ctx: &mut Context<'_>, typing: bool) -> HandlerResult {
    let Some(room_id) = ctx.session.current_room.as_ref() else {
        return Ok(());
    };

    let event = Outbound::UserTyping {
        user_id: ctx.session.identity.id.clone(),
        room_id: room_id.clone(),
        typing,
    }
    .encode();
    ctx.relay.rooms.broadcast(
        &ctx.relay.connections,
        room_id,
        &event,
        Some(&ctx.session.conn_id),
    );
    Ok(())
}
