use axum::response::sse::Event;
use events::category::HANDSHAKE_EVENT_TYPE;
use events::push::handshake_payload;
use events::schema::Role;
use events::{EventType, Id, PushEvent};

#[derive(Debug, Clone)]
pub struct Message {
    pub event: PushEvent,
    pub scope: MessageScope,
}

/// Who an event is delivered to.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageScope {
    /// The listed users only.
    Users { user_ids: Vec<Id> },
    /// The listed users plus every connected agent and admin.
    UsersAndStaff { user_ids: Vec<Id> },
    /// Every connected user with this role.
    Role { role: Role },
    /// Send to all connected users
    Broadcast,
}

/// Encodes a push event as one SSE frame whose `event:` field is the type tag.
pub fn encode(event: &PushEvent) -> Result<Event, serde_json::Error> {
    let data = serde_json::to_string(event)?;
    Ok(Event::default().event(event.event_type()).data(data))
}

/// The first frame written to every new stream.
pub fn handshake_event() -> Event {
    Event::default()
        .event(HANDSHAKE_EVENT_TYPE)
        .data(handshake_payload())
}
