use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use skillswap_shared::protocol::ServerEvent;
use skillswap_shared::{ConnectionId, UserId};

/// Outbound queue of one connection. The transport drains the receiving end
/// and writes each event to the socket.
pub type Outbox = mpsc::Sender<ServerEvent>;

struct ConnectionEntry {
    user: UserId,
    outbox: Outbox,
    connected_at: DateTime<Utc>,
}

/// Result of registering a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Every user with at least one connection, including the new one.
    pub online_users: Vec<UserId>,

    /// True when this was the user's first live connection.
    pub came_online: bool,

    /// A user who lost their last connection because the connection id was
    /// re-registered under someone else.
    pub displaced: Option<UserId>,
}

/// Live connections grouped by user.
///
/// A user is online exactly while their connection set is non-empty, and a
/// connection belongs to at most one user.
#[derive(Default)]
pub struct ConnectionRegistry {
    users: HashMap<UserId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        user: UserId,
        connection: ConnectionId,
        outbox: Outbox,
    ) -> Registration {
        let mut displaced = None;
        if let Some(entry) = self.connections.get_mut(&connection) {
            if entry.user == user {
                entry.outbox = outbox;
                return Registration {
                    online_users: self.online_users(),
                    came_online: false,
                    displaced: None,
                };
            }
            let previous = entry.user.clone();
            if self.deregister(&previous, connection) {
                displaced = Some(previous);
            }
        }

        let set = self.users.entry(user.clone()).or_default();
        let came_online = set.is_empty();
        set.insert(connection);
        self.connections.insert(
            connection,
            ConnectionEntry {
                user: user.clone(),
                outbox,
                connected_at: Utc::now(),
            },
        );

        info!(
            user = %user,
            connection = %connection.short(),
            devices = self.users.get(&user).map_or(0, HashSet::len),
            "Connection registered"
        );

        Registration {
            online_users: self.online_users(),
            came_online,
            displaced,
        }
    }

    /// Remove a connection. Returns `true` when this was the user's last one.
    ///
    /// A connection that is not registered to `user` is left alone.
    pub fn deregister(&mut self, user: &UserId, connection: ConnectionId) -> bool {
        match self.connections.get(&connection) {
            Some(entry) if &entry.user == user => {}
            _ => return false,
        }
        let entry = self.connections.remove(&connection);

        let went_offline = match self.users.get_mut(user) {
            Some(set) => {
                set.remove(&connection);
                set.is_empty()
            }
            None => false,
        };
        if went_offline {
            self.users.remove(user);
        }

        if let Some(entry) = entry {
            let held_for = Utc::now() - entry.connected_at;
            info!(
                user = %user,
                connection = %connection.short(),
                secs = held_for.num_seconds(),
                went_offline,
                "Connection deregistered"
            );
        }

        went_offline
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.users.get(user).is_some_and(|set| !set.is_empty())
    }

    /// Sorted snapshot of online users.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.users.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn connections_of(&self, user: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn user_of(&self, connection: ConnectionId) -> Option<&UserId> {
        self.connections.get(&connection).map(|e| &e.user)
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn send_to_connection(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection) {
            Some(entry) => deliver(connection, &entry.outbox, event),
            None => false,
        }
    }

    /// Fan an event out to every connection of `user`. Returns how many
    /// queues accepted it.
    pub fn send_to_user(&self, user: &UserId, event: &ServerEvent) -> usize {
        let Some(set) = self.users.get(user) else {
            return 0;
        };
        set.iter()
            .filter(|c| self.send_to_connection(**c, event.clone()))
            .count()
    }

    pub fn send_to_connections<'a>(
        &self,
        connections: impl IntoIterator<Item = &'a ConnectionId>,
        event: &ServerEvent,
    ) -> usize {
        connections
            .into_iter()
            .filter(|c| self.send_to_connection(**c, event.clone()))
            .count()
    }

    /// Deliver to every live connection except `except`.
    pub fn broadcast_except(&self, except: ConnectionId, event: &ServerEvent) -> usize {
        self.connections
            .iter()
            .filter(|(id, _)| **id != except)
            .filter(|(id, entry)| deliver(**id, &entry.outbox, event.clone()))
            .count()
    }
}

fn deliver(connection: ConnectionId, outbox: &Outbox, event: ServerEvent) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!(connection = %connection.short(), "Dropping event for slow connection");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(connection = %connection.short(), "Outbox closed");
            false
        }
    }
}
