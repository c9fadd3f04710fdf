//! Presence tracker.
//!
//! Turns connection-registry occupancy transitions into persisted status and
//! `USER_STATUS` broadcasts. Persistence failures are logged and never stop
//! the broadcast or the connection.

use crate::auth::UserIdentity;
use crate::db::Database;
use crate::proto::{Outbound, PresenceStatus};
use crate::state::{ConnectionManager, Departure, PresenceTransition};
use tracing::warn;

pub struct PresenceTracker {
    db: Database,
}

impl PresenceTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply a connect transition: always refresh the stored user record,
    /// broadcast "online" only when this was the user's first connection.
    pub async fn connected(
        &self,
        connections: &ConnectionManager,
        identity: &UserIdentity,
        transition: PresenceTransition,
    ) {
        if let Err(e) = self
            .db
            .users()
            .upsert_presence(
                &identity.id,
                &identity.email,
                identity.name.as_deref(),
                PresenceStatus::Online,
            )
            .await
        {
            warn!(user_id = %identity.id, error = %e, "failed to persist online status");
        }

        if transition == PresenceTransition::CameOnline {
            let frame = Outbound::UserStatus {
                user_id: identity.id.clone(),
                status: PresenceStatus::Online,
            }
            .encode();
            connections.broadcast_to_all(&frame, None);
        }
    }

    /// Apply a disconnect transition: persist and broadcast "offline" only
    /// when the user's last connection went away.
    pub async fn disconnected(
        &self,
        connections: &ConnectionManager,
        user_id: &str,
        departure: Departure,
    ) {
        if departure != Departure::WentOffline {
            return;
        }

        if let Err(e) = self.db.users().set_offline(user_id).await {
            warn!(user_id = %user_id, error = %e, "failed to persist offline status");
        }

        let frame = Outbound::UserStatus {
            user_id: user_id.to_string(),
            status: PresenceStatus::Offline,
        }
        .encode();
        connections.broadcast_to_all(&frame, None);
    }
}
