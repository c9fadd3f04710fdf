//! Connection teardown.

use crate::proto::Outbound;
use crate::state::{Relay, Session};
use std::sync::Arc;

/// Tear down a connection: leave its room (announcing the departure), drop it
/// from the registry, and apply the presence transition. Safe to call exactly
/// once per connection; the registry treats an unknown connection as already
/// gone.
pub async fn teardown(relay: &Arc<Relay>, session: &mut Session) {
    if let Some(room_id) = session.current_room.take() {
        relay.rooms.leave(&session.conn_id, &room_id);
        let announce = Outbound::UserLeft {
            user_id: session.identity.id.clone(),
            room_id: room_id.clone(),
        }
        .encode();
        relay
            .rooms
            .broadcast(&relay.connections, &room_id, &announce, None);
    }

    let departure = relay
        .connections
        .unregister(&session.identity.id, &session.conn_id);
    relay
        .presence
        .disconnected(&relay.connections, &session.identity.id, departure)
        .await;
}
