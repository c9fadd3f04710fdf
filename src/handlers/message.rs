//! Message send and read-receipt handlers.

use super::Context;
use crate::db::NewMessage;
use crate::error::HandlerResult;
use crate::proto::{MessageEvent, Outbound};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

/// `ROOM_MESSAGE`: assign id and timestamp, persist, then fan out to the
/// whole room including the sender.
///
/// The broadcast deliberately proceeds even when the durable write fails:
/// live members still get the message, the failure is only logged. Ignored
/// silently outside a room or for whitespace-only content.
pub async fn room_message(ctx: &mut Context<'_>, message: String) -> HandlerResult {
    let Some(room_id) = ctx.session.current_room.clone() else {
        return Ok(());
    };
    let content = message.trim();
    if content.is_empty() {
        return Ok(());
    }

    let new_message = NewMessage {
        id: Uuid::new_v4().to_string(),
        room_id: room_id.clone(),
        sender_id: ctx.session.identity.id.clone(),
        content: content.to_string(),
        created_at: Utc::now(),
    };

    match ctx.relay.db.messages().insert(&new_message).await {
        Ok(()) => {
            if let Err(e) = ctx.relay.db.rooms().touch(&room_id).await {
                warn!(room = %room_id, error = %e, "failed to touch room timestamp");
            }
        }
        Err(e) => {
            warn!(room = %room_id, message_id = %new_message.id, error = %e,
                  "failed to persist message, relaying anyway");
        }
    }

    let event = Outbound::RoomMessage(MessageEvent::new(
        new_message.id,
        new_message.room_id,
        new_message.sender_id,
        Some(ctx.session.identity.email.clone()),
        ctx.session.identity.name.clone(),
        new_message.content,
        new_message.created_at,
    ));
    ctx.relay
        .rooms
        .broadcast(&ctx.relay.connections, &room_id, &event.encode(), None);

    Ok(())
}

/// `MESSAGE_READ`: idempotent receipt insert; duplicates are ignored.
pub async fn message_read(ctx: &mut Context<'_>, message_id: String) -> HandlerResult {
    if let Err(e) = ctx
        .relay
        .db
        .messages()
        .insert_receipt(&message_id, &ctx.session.identity.id)
        .await
    {
        warn!(message_id = %message_id, user_id = %ctx.session.identity.id, error = %e,
              "failed to store read receipt");
    }
    Ok(())
}
