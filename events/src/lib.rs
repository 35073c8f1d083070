//! Event system infrastructure for the Support Desk.
//!
//! This crate provides the event system that enables loose coupling between
//! domain logic and infrastructure concerns (like SSE notifications), and the
//! event schema shared with clients of the push stream.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//! - **category**: The fixed event-type → category table used for routing and dispatch
//! - **push**: The wire format of events delivered over the push stream
//! - **lifecycle**: Room and ticket state machines
//! - **schema**: Entity views and enums shared by server and client
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod category;
pub mod lifecycle;
pub mod push;
pub mod schema;

pub use category::{category_for, Category};
pub use lifecycle::{RoomTransition, TicketTransition, TransitionError};
pub use push::{EventType, Incoming, PushEvent};

use schema::{ChatMessageView, OrderStatus, Role, RoomView, TicketMessageView, TicketStatus, TicketView};

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the write that produced them has committed.
///
/// Each event carries the full post-change entity view so subscribers can
/// update without fetching.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A customer opened a new chat room; it starts out waiting.
    RoomOpened { room: RoomView },
    /// A room changed status through one of its lifecycle transitions.
    RoomTransitioned {
        room: RoomView,
        transition: RoomTransition,
        /// User whose request caused the transition.
        actor_id: Id,
        /// Agent assigned before the transition, used to notify an agent
        /// who just lost the room.
        previous_agent_id: Option<Id>,
    },
    /// A message was appended to either room transcript.
    RoomMessagePosted {
        room: RoomView,
        message: ChatMessageView,
    },
    TicketOpened { ticket: TicketView },
    TicketTransitioned {
        ticket: TicketView,
        transition: TicketTransition,
        previous_status: TicketStatus,
        actor_id: Id,
    },
    TicketMessagePosted {
        ticket: TicketView,
        message: TicketMessageView,
    },
    /// Raised by the order service so the customer sees shipping updates live.
    OrderStatusChanged {
        order_id: Id,
        customer_id: Id,
        status: OrderStatus,
    },
    /// Free-form notice for everyone, or for one role.
    NoticeBroadcast { message: String, role: Option<Role> },
    /// A user's live session must end.
    SessionRevoked { user_id: Id, reason: String },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            let name = match event {
                DomainEvent::NoticeBroadcast { message, .. } => message.clone(),
                other => format!("{other:?}"),
            };
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, name));
        }
    }

    #[tokio::test]
    async fn publish_calls_handlers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(Recorder {
                label: "first",
                seen: seen.clone(),
            }))
            .with_handler(Arc::new(Recorder {
                label: "second",
                seen: seen.clone(),
            }));

        publisher
            .publish(DomainEvent::NoticeBroadcast {
                message: "maintenance".to_string(),
                role: None,
            })
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:maintenance", "second:maintenance"]
        );
    }

    #[tokio::test]
    async fn with_handler_leaves_the_original_publisher_untouched() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bare = EventPublisher::new();
        let _wired = bare.clone().with_handler(Arc::new(Recorder {
            label: "only",
            seen: seen.clone(),
        }));

        bare.publish(DomainEvent::SessionRevoked {
            user_id: Id::new_v4(),
            reason: "test".to_string(),
        })
        .await;

        assert!(seen.lock().unwrap().is_empty());
    }
}
