use axum::response::sse::Event;
use dashmap::DashMap;
use events::schema::Role;
use log::*;
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedSender;

pub type UserId = events::Id;

pub type EventSender = UnboundedSender<Result<Event, Infallible>>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub role: Role,
    pub sender: EventSender,
}

/// Live streams keyed by user id. A user has at most one entry.
pub struct ConnectionRegistry {
    connections: DashMap<UserId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Registers `sender` as the user's stream. A previous stream for the same
    /// user is dropped, which ends it.
    pub fn register(&self, user_id: UserId, role: Role, sender: EventSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        let replaced = self.connections.insert(
            user_id,
            ConnectionInfo {
                connection_id: connection_id.clone(),
                role,
                sender,
            },
        );

        if let Some(previous) = replaced {
            debug!(
                "Connection {} for user {user_id} replaced by {}",
                previous.connection_id.as_str(),
                connection_id.as_str()
            );
        }

        connection_id
    }

    /// Removes the user's entry only if it is still `connection_id`, so a
    /// stream that ends late cannot evict the stream that replaced it.
    pub fn unregister(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        self.connections
            .remove_if(user_id, |_, info| info.connection_id == *connection_id)
            .is_some()
    }

    /// Writes to the user's stream if they have one. Returns whether the
    /// event was handed to a live stream.
    pub fn send_to_user(&self, user_id: &UserId, event: Event) -> bool {
        // Clone out of the map so the shard lock is released before any cleanup
        let Some((connection_id, sender)) = self
            .connections
            .get(user_id)
            .map(|info| (info.connection_id.clone(), info.sender.clone()))
        else {
            return false;
        };

        match sender.send(Ok(event)) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to send event to connection {}: {}. Removing it.",
                    connection_id.as_str(),
                    e
                );
                self.unregister(user_id, &connection_id);
                false
            }
        }
    }

    /// Users currently connected whose role satisfies `filter`.
    pub fn connected_users<F>(&self, filter: F) -> Vec<UserId>
    where
        F: Fn(Role) -> bool,
    {
        self.connections
            .iter()
            .filter(|entry| filter(entry.value().role))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{error::TryRecvError, unbounded_channel};

    #[test]
    fn register_replaces_and_closes_the_previous_stream() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new_v4();
        let (first_tx, mut first_rx) = unbounded_channel();
        let (second_tx, mut second_rx) = unbounded_channel();

        registry.register(user_id, Role::Agent, first_tx);
        registry.register(user_id, Role::Agent, second_tx);

        assert_eq!(registry.len(), 1);
        assert!(matches!(first_rx.try_recv(), Err(TryRecvError::Disconnected)));

        assert!(registry.send_to_user(&user_id, Event::default().data("hi")));
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn stale_unregister_keeps_the_replacement() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new_v4();
        let (first_tx, _first_rx) = unbounded_channel();
        let (second_tx, _second_rx) = unbounded_channel();

        let stale = registry.register(user_id, Role::Customer, first_tx);
        let current = registry.register(user_id, Role::Customer, second_tx);

        assert!(!registry.unregister(&user_id, &stale));
        assert!(registry.is_connected(&user_id));
        assert!(registry.unregister(&user_id, &current));
        assert!(!registry.is_connected(&user_id));
    }

    #[test]
    fn send_to_absent_user_is_a_no_op() {
        let registry = ConnectionRegistry::new();

        assert!(!registry.send_to_user(&UserId::new_v4(), Event::default().data("x")));
    }

    #[test]
    fn failed_send_removes_the_dead_stream() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new_v4();
        let (tx, rx) = unbounded_channel();
        registry.register(user_id, Role::Customer, tx);
        drop(rx);

        assert!(!registry.send_to_user(&user_id, Event::default().data("x")));
        assert!(registry.is_empty());
    }

    #[test]
    fn connected_users_filters_by_role() {
        let registry = ConnectionRegistry::new();
        let agent = UserId::new_v4();
        let admin = UserId::new_v4();
        let customer = UserId::new_v4();
        let mut receivers = Vec::new();
        for (user_id, role) in [
            (agent, Role::Agent),
            (admin, Role::Admin),
            (customer, Role::Customer),
        ] {
            let (tx, rx) = unbounded_channel();
            receivers.push(rx);
            registry.register(user_id, role, tx);
        }

        let mut staff = registry.connected_users(|role| role.is_staff());
        staff.sort();
        let mut expected = vec![agent, admin];
        expected.sort();

        assert_eq!(staff, expected);
    }
}
