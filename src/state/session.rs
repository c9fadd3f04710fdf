//! Per-connection session state.

use crate::auth::UserIdentity;
use crate::state::ConnId;

/// The event router's per-connection record. Owned by the connection task;
/// handlers receive it as `&mut`, so all mutation is serial per connection.
#[derive(Debug)]
pub struct Session {
    pub conn_id: ConnId,
    /// Resolved once at connect, immutable afterwards.
    pub identity: UserIdentity,
    /// The one room this connection is currently in, if any. Kept in lockstep
    /// with the room membership table by the join/leave handlers.
    pub current_room: Option<String>,
}

impl Session {
    pub fn new(conn_id: ConnId, identity: UserIdentity) -> Self {
        Self {
            conn_id,
            identity,
            current_room: None,
        }
    }
}
