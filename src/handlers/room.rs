//! Room join/leave handlers.

use super::Context;
use crate::error::HandlerResult;
use crate::proto::Outbound;
use tracing::warn;

/// `JOIN_ROOM`: switch this connection's membership to the target room,
/// moving the caller's last-read marker, then confirm to the sender and
/// announce to the room.
pub async fn join_room(ctx: &mut Context<'_>, room_id: String) -> HandlerResult {
    let previous = ctx.session.current_room.take();
    ctx.relay
        .rooms
        .join(&ctx.session.conn_id, &room_id, previous.as_deref());
    ctx.session.current_room = Some(room_id.clone());

    if let Err(e) = ctx
        .relay
        .db
        .rooms()
        .mark_read(&room_id, &ctx.session.identity.id)
        .await
    {
        warn!(room = %room_id, user_id = %ctx.session.identity.id, error = %e,
              "failed to move last-read marker");
    }

    ctx.reply(Outbound::JoinedRoom {
        room_id: room_id.clone(),
    });

    let announce = Outbound::UserJoined {
        user_id: ctx.session.identity.id.clone(),
        room_id: room_id.clone(),
    }
    .encode();
    ctx.relay.rooms.broadcast(
        &ctx.relay.connections,
        &room_id,
        &announce,
        Some(&ctx.session.conn_id),
    );

    Ok(())
}

/// `LEAVE_ROOM`: announce to the room, then drop membership. No-op when the
/// connection is not in a room.
pub fn leave_room(ctx: &mut Context<'_>) -> HandlerResult {
    let Some(room_id) = ctx.session.current_room.take() else {
        return Ok(());
    };

    let announce = Outbound::UserLeft {
        user_id: ctx.session.identity.id.clone(),
        room_id: room_id.clone(),
    }
    .encode();
    ctx.relay.rooms.broadcast(
        &ctx.relay.connections,
        &room_id,
        &announce,
        Some(&ctx.session.conn_id),
    );

    ctx.relay.rooms.leave(&ctx.session.conn_id, &room_id);
    Ok(())
}
