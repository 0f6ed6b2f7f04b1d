use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use skillswap_shared::{ConnectionId, SessionId};

/// Connections subscribed to one call session.
pub(crate) struct SessionRoom {
    session_id: SessionId,
    members: HashSet<ConnectionId>,
}

impl SessionRoom {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            members: HashSet::new(),
        }
    }

    fn join(&mut self, connection: ConnectionId) -> bool {
        let added = self.members.insert(connection);
        if added {
            info!(
                room = %self.session_id.room_name(),
                connection = %connection.short(),
                members = self.members.len(),
                "Connection joined session room"
            );
        }
        added
    }

    fn leave(&mut self, connection: &ConnectionId) -> bool {
        let removed = self.members.remove(connection);
        if removed {
            debug!(
                room = %self.session_id.room_name(),
                connection = %connection.short(),
                members = self.members.len(),
                "Connection left session room"
            );
        }
        removed
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Session broadcast scopes. Rooms appear on first join and vanish when
/// their last connection leaves.
#[derive(Default)]
pub(crate) struct SessionRooms {
    rooms: HashMap<SessionId, SessionRoom>,
}

impl SessionRooms {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join a room (creates it if missing).
    pub(crate) fn join(&mut self, session_id: SessionId, connection: ConnectionId) -> bool {
        self.rooms
            .entry(session_id)
            .or_insert_with(|| SessionRoom::new(session_id))
            .join(connection)
    }

    /// Drop a connection from every room it joined. Auto-deletes emptied rooms.
    pub(crate) fn leave_all(&mut self, connection: &ConnectionId) {
        self.rooms.retain(|session_id, room| {
            room.leave(connection);
            if room.is_empty() {
                info!(room = %session_id.room_name(), "Removed empty session room");
                false
            } else {
                true
            }
        });
    }

    /// Current members, in no particular order.
    pub(crate) fn members(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.rooms
            .get(session_id)
            .map(|r| r.members.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
