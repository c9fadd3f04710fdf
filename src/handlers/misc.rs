//! Keepalive.

use super::Context;
use crate::error::HandlerResult;
use crate::proto::Outbound;

/// `PING`: reply `PONG` to the sender only. Legal in any state.
pub fn ping(ctx: &mut Context<'_>) -> HandlerResult {
    ctx.reply(Outbound::Pong {});
    Ok(())
}
