use crate::connection::{ConnectionId, ConnectionRegistry, EventSender, UserId};
use crate::message::{encode, Message as SseMessage, MessageScope};
use crate::router::audience_for;
use events::schema::Role;
use events::{EventType, PushEvent};
use log::*;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(
        &self,
        user_id: UserId,
        role: Role,
        sender: EventSender,
    ) -> ConnectionId {
        let connection_id = self.registry.register(user_id, role, sender);
        info!("Registered SSE connection for {role} {user_id}");
        connection_id
    }

    pub fn unregister_connection(&self, user_id: &UserId, connection_id: &ConnectionId) {
        if self.registry.unregister(user_id, connection_id) {
            info!("Unregistered SSE connection for user {user_id}");
        }
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.registry.is_connected(user_id)
    }

    /// Delivers an event to the audience its type and payload call for.
    pub fn route(&self, event: PushEvent) -> usize {
        let scope = audience_for(&event);
        self.send_message(SseMessage { event, scope })
    }

    /// Sends a message to every connected user in its scope, once each.
    /// Returns how many streams accepted it.
    pub fn send_message(&self, message: SseMessage) -> usize {
        let event_type = message.event.event_type();

        let event = match encode(&message.event) {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to serialize SSE event {event_type}: {e}");
                return 0;
            }
        };

        let recipients = self.recipients(&message.scope);
        if recipients.is_empty() {
            debug!("No connected recipients for SSE event {event_type}");
            return 0;
        }

        let delivered = recipients
            .iter()
            .filter(|user_id| self.registry.send_to_user(user_id, event.clone()))
            .count();

        debug!(
            "Sent SSE event {event_type} to {delivered} of {} recipient(s)",
            recipients.len()
        );

        delivered
    }

    fn recipients(&self, scope: &MessageScope) -> Vec<UserId> {
        let candidates = match scope {
            MessageScope::Users { user_ids } => user_ids.clone(),
            MessageScope::UsersAndStaff { user_ids } => {
                let mut all = user_ids.clone();
                all.extend(self.registry.connected_users(|role| role.is_staff()));
                all
            }
            MessageScope::Role { role } => {
                let wanted = *role;
                self.registry.connected_users(|role| role == wanted)
            }
            MessageScope::Broadcast => self.registry.connected_users(|_| true),
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|user_id| seen.insert(*user_id))
            .collect()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
