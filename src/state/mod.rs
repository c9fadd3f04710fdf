//! Shared relay state.
//!
//! One `Relay` instance is created at startup and shared with every
//! connection task and HTTP handler. All mutable maps live inside the
//! manager structs; nothing here is a module-level global.

pub mod managers;
pub mod session;

pub use managers::connection::{ConnectionManager, Departure, PresenceTransition};
pub use managers::presence::PresenceTracker;
pub use managers::room::RoomManager;
pub use session::Session;

use crate::auth::SessionVerifier;
use crate::config::LimitsConfig;
use crate::db::Database;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Unique handle for one live connection.
pub type ConnId = String;

/// Shared state hub: connection registry, room membership, presence, and the
/// collaborator handles (database, session verifier).
pub struct Relay {
    pub connections: ConnectionManager,
    pub rooms: RoomManager,
    pub presence: PresenceTracker,
    pub db: Database,
    pub verifier: Arc<dyn SessionVerifier>,
    pub limits: LimitsConfig,
    started_at: Instant,
}

impl Relay {
    pub fn new(db: Database, verifier: Arc<dyn SessionVerifier>, limits: LimitsConfig) -> Self {
        Self {
            connections: ConnectionManager::new(),
            rooms: RoomManager::new(),
            presence: PresenceTracker::new(db.clone()),
            db,
            verifier,
            limits,
            started_at: Instant::now(),
        }
    }

    /// Generate a fresh connection handle.
    pub fn next_conn_id(&self) -> ConnId {
        Uuid::new_v4().to_string()
    }

    /// Seconds since the relay started, for the health endpoint.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
