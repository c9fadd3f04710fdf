//! Room membership table and broadcaster.
//!
//! Maps room ids to the set of live connections subscribed to them. A
//! connection is in at most one room; joining a new room removes it from the
//! previous one first, so no connection is ever double-counted.
//!
//! Fan-out holds the room entry's exclusive guard while enqueueing, which
//! serializes broadcasts to the same room: every member observes messages in
//! the order the handlers processed them.

use crate::proto::Frame;
use crate::state::{ConnId, ConnectionManager};
use dashmap::DashMap;
use std::collections::HashSet;

/// Room membership table.
pub struct RoomManager {
    rooms: DashMap<String, HashSet<ConnId>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Subscribe a connection to a room, leaving `previous` first when given.
    /// Remove-before-insert: the connection may briefly be in neither set,
    /// never in both, so fan-out can skip it but can never duplicate it.
    pub fn join(&self, conn_id: &ConnId, room_id: &str, previous: Option<&str>) {
        if let Some(prev) = previous
            && prev != room_id
            && let Some(mut members) = self.rooms.get_mut(prev)
        {
            members.remove(conn_id);
        }
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id.clone());
    }

    /// Unsubscribe a connection from a room. No-op when it is not a member.
    /// The room entry itself is kept; rooms stay addressable while empty.
    pub fn leave(&self, conn_id: &ConnId, room_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(conn_id);
        }
    }

    /// Whether the connection is currently in the room.
    pub fn contains(&self, room_id: &str, conn_id: &ConnId) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.contains(conn_id))
            .unwrap_or(false)
    }

    /// Current member count of a room.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one live member.
    pub fn active_rooms(&self) -> usize {
        self.rooms.iter().filter(|e| !e.value().is_empty()).count()
    }

    /// Deliver a frame to every open connection in the room, skipping
    /// `exclude` when given. A room with no entry (or no members) is a legal
    /// no-op. Delivery is best-effort per recipient: a failed enqueue
    /// schedules that connection for close and the loop continues.
    pub fn broadcast(
        &self,
        connections: &ConnectionManager,
        room_id: &str,
        frame: &Frame,
        exclude: Option<&ConnId>,
    ) {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return;
        };
        for conn_id in members.iter() {
            if Some(conn_id) == exclude {
                continue;
            }
            connections.try_send(conn_id, frame);
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
