//! Connection registry.
//!
//! Tracks which live connections belong to which user (a user may hold
//! several simultaneous sessions) and owns the outbound sender for every
//! connection. Presence transitions are derived here: only the
//! empty<->non-empty boundary of a user's session set produces one.

use crate::proto::Frame;
use crate::state::ConnId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::warn;

/// Outcome of registering a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First session for this user: broadcast "online".
    CameOnline,
    /// Additional session: no presence event.
    AlreadyOnline,
}

/// Outcome of unregistering a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Last session gone: broadcast "offline".
    WentOffline,
    /// Other sessions remain: no presence event.
    StillOnline,
    /// The connection was not registered (already torn down).
    Unknown,
}

/// Registry of live connections per user, plus per-connection senders.
pub struct ConnectionManager {
    sessions: DashMap<String, HashSet<ConnId>>,
    senders: DashMap<ConnId, mpsc::Sender<Frame>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            senders: DashMap::new(),
        }
    }

    /// Add a connection to the user's session set. Safe under concurrent
    /// calls for the same or different users; the transition is decided under
    /// the entry's shard lock.
    pub fn register(
        &self,
        user_id: &str,
        conn_id: &ConnId,
        tx: mpsc::Sender<Frame>,
    ) -> PresenceTransition {
        self.senders.insert(conn_id.clone(), tx);

        let mut entry = self.sessions.entry(user_id.to_string()).or_default();
        let was_empty = entry.is_empty();
        entry.insert(conn_id.clone());
        if was_empty {
            PresenceTransition::CameOnline
        } else {
            PresenceTransition::AlreadyOnline
        }
    }

    /// Remove a connection. When the set empties, the user entry is removed
    /// entirely and the caller is told the user went offline.
    pub fn unregister(&self, user_id: &str, conn_id: &ConnId) -> Departure {
        self.senders.remove(conn_id);

        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let removed = occupied.get_mut().remove(conn_id);
                if !removed {
                    Departure::Unknown
                } else if occupied.get().is_empty() {
                    occupied.remove();
                    Departure::WentOffline
                } else {
                    Departure::StillOnline
                }
            }
            Entry::Vacant(_) => Departure::Unknown,
        }
    }

    /// Point-in-time presence read.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Number of distinct online users.
    pub fn online_users(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live sessions for one user.
    pub fn session_count(&self, user_id: &str) -> usize {
        self.sessions.get(user_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether a connection still has a live sender.
    pub fn is_open(&self, conn_id: &ConnId) -> bool {
        self.senders.contains_key(conn_id)
    }

    /// Best-effort enqueue to one connection. A full or closed queue counts
    /// as a failed send: the sender is dropped, which schedules the
    /// connection for close without affecting other recipients.
    pub fn try_send(&self, conn_id: &ConnId, frame: &Frame) -> bool {
        let Some(tx) = self.senders.get(conn_id).map(|s| s.value().clone()) else {
            return false;
        };
        if let Err(e) = tx.try_send(frame.clone()) {
            warn!(conn_id = %conn_id, error = %e, "send failed, scheduling connection close");
            self.senders.remove(conn_id);
            return false;
        }
        true
    }

    /// Drop a connection's sender, forcing its event loop to wind down.
    pub fn schedule_close(&self, conn_id: &ConnId) {
        self.senders.remove(conn_id);
    }

    /// Deliver a frame to every registered connection. Used only for
    /// presence. Recipients are snapshotted first so a failed send (which
    /// removes from the map) cannot deadlock the iteration.
    pub fn broadcast_to_all(&self, frame: &Frame, exclude: Option<&ConnId>) {
        let targets: Vec<ConnId> = self
            .senders
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for conn_id in targets {
            if Some(&conn_id) == exclude {
                continue;
            }
            self.try_send(&conn_id, frame);
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan() -> mpsc::Sender<Frame> {
        let (tx, rx) = mpsc::channel(8);
        std::mem::forget(rx);
        tx
    }

    #[test]
    fn test_first_session_comes_online() {
        let manager = ConnectionManager::new();
        assert!(!manager.is_online("u1"));
        let t = manager.register("u1", &"c1".to_string(), chan());
        assert_eq!(t, PresenceTransition::CameOnline);
        assert!(manager.is_online("u1"));
    }

    #[test]
    fn test_second_session_is_silent() {
        let manager = ConnectionManager::new();
        manager.register("u1", &"c1".to_string(), chan());
        let t = manager.register("u1", &"c2".to_string(), chan());
        assert_eq!(t, PresenceTransition::AlreadyOnline);
        assert_eq!(manager.session_count("u1"), 2);
    }

    #[test]
    fn test_departures() {
        let manager = ConnectionManager::new();
        manager.register("u1", &"c1".to_string(), chan());
        manager.register("u1", &"c2".to_string(), chan());

        assert_eq!(
            manager.unregister("u1", &"c1".to_string()),
            Departure::StillOnline
        );
        assert!(manager.is_online("u1"));

        assert_eq!(
            manager.unregister("u1", &"c2".to_string()),
            Departure::WentOffline
        );
        assert!(!manager.is_online("u1"));

        // Idempotent teardown: a second unregister is a no-op.
        assert_eq!(
            manager.unregister("u1", &"c2".to_string()),
            Departure::Unknown
        );
    }

    #[tokio::test]
    async fn test_failed_send_drops_sender() {
        let manager = ConnectionManager::new();
        let (tx, rx) = mpsc::channel(1);
        manager.register("u1", &"c1".to_string(), tx);
        drop(rx);

        let frame: Frame = std::sync::Arc::from("{}");
        assert!(!manager.try_send(&"c1".to_string(), &frame));
        assert!(!manager.is_open(&"c1".to_string()));
    }

    #[tokio::test]
    async fn test_full_queue_counts_as_failed_send() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(1);
        manager.register("u1", &"c1".to_string(), tx);

        let frame: Frame = std::sync::Arc::from("{}");
        assert!(manager.try_send(&"c1".to_string(), &frame));
        // Queue depth 1: the second enqueue fails and schedules close.
        assert!(!manager.try_send(&"c1".to_string(), &frame));
        assert!(!manager.is_open(&"c1".to_string()));
    }
}
