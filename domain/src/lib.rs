//! Domain mutators for live-chat rooms and support tickets.
//!
//! Every state change is written with a conditional update and, once the
//! write has committed, announced through exactly one [`DomainEvent`].

pub use entity_api::{
    chat_rooms, support_tickets, users, Id, Priority, Role, RoomStatus, SenderType, TicketStatus,
};
pub use events::schema::{
    ChatMessageView, CustomerProfile, OrderStatus, RoomView, TicketMessageView, TicketView,
};
pub use events::{DomainEvent, EventPublisher, RoomTransition, TicketTransition};

pub mod chat_room;
pub mod error;
pub mod notification;
pub mod support_ticket;
pub mod system;
pub mod user;

#[cfg(test)]
#[cfg(feature = "mock")]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use events::{DomainEvent, EventHandler, EventPublisher};
    use std::sync::{Arc, Mutex};

    /// Collects every published event for later inspection.
    #[derive(Default)]
    pub struct RecordingHandler {
        pub events: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &DomainEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    pub fn recording_publisher() -> (EventPublisher, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let publisher = EventPublisher::new().with_handler(handler.clone());
        (publisher, handler)
    }
}
