use crate::category::{category_for, Category, HANDSHAKE_EVENT_TYPE};
use crate::schema::{
    ChatMessageView, OrderStatus, Role, RoomView, TicketMessageView, TicketStatus, TicketView,
};
use crate::Id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for getting the push event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// One JSON object per event on the wire: `{"type": ..., ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    // Live chat
    NewMessage {
        room: RoomView,
        message: ChatMessageView,
    },
    AgentJoined {
        room: RoomView,
        agent_id: Id,
    },
    AgentConcluded {
        room: RoomView,
        agent_id: Id,
    },
    ChatClosed {
        room: RoomView,
    },
    NewChatRoom {
        room: RoomView,
    },
    CustomerDisconnected {
        room: RoomView,
        previous_agent_id: Option<Id>,
    },
    RoomReactivated {
        room: RoomView,
    },
    RoomReturnedToWaiting {
        room: RoomView,
        previous_agent_id: Option<Id>,
    },

    // Order notifications
    Processing {
        order_id: Id,
        customer_id: Id,
    },
    Shipped {
        order_id: Id,
        customer_id: Id,
    },
    Delivered {
        order_id: Id,
        customer_id: Id,
    },
    Cancelled {
        order_id: Id,
        customer_id: Id,
    },

    // Support tickets
    NewSupportTicket {
        ticket: TicketView,
    },
    SupportTicketMessage {
        ticket: TicketView,
        message: TicketMessageView,
    },
    TicketAgentAssigned {
        ticket: TicketView,
        agent_id: Id,
    },
    TicketStatusUpdated {
        ticket: TicketView,
        previous_status: TicketStatus,
        changed_by: Id,
    },

    // System events
    ForceLogout {
        user_id: Id,
        reason: String,
    },
    SystemNotice {
        message: String,
        role: Option<Role>,
    },
}

impl EventType for PushEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PushEvent::NewMessage { .. } => "new_message",
            PushEvent::AgentJoined { .. } => "agent_joined",
            PushEvent::AgentConcluded { .. } => "agent_concluded",
            PushEvent::ChatClosed { .. } => "chat_closed",
            PushEvent::NewChatRoom { .. } => "new_chat_room",
            PushEvent::CustomerDisconnected { .. } => "customer_disconnected",
            PushEvent::RoomReactivated { .. } => "room_reactivated",
            PushEvent::RoomReturnedToWaiting { .. } => "room_returned_to_waiting",
            PushEvent::Processing { .. } => "processing",
            PushEvent::Shipped { .. } => "shipped",
            PushEvent::Delivered { .. } => "delivered",
            PushEvent::Cancelled { .. } => "cancelled",
            PushEvent::NewSupportTicket { .. } => "new_support_ticket",
            PushEvent::SupportTicketMessage { .. } => "support_ticket_message",
            PushEvent::TicketAgentAssigned { .. } => "ticket_agent_assigned",
            PushEvent::TicketStatusUpdated { .. } => "ticket_status_updated",
            PushEvent::ForceLogout { .. } => "force_logout",
            PushEvent::SystemNotice { .. } => "system_notice",
        }
    }
}

impl PushEvent {
    pub fn category(&self) -> Category {
        category_for(self.event_type())
    }

    /// Builds the notification event that matches an order status.
    pub fn order_status(status: OrderStatus, order_id: Id, customer_id: Id) -> PushEvent {
        match status {
            OrderStatus::Processing => PushEvent::Processing {
                order_id,
                customer_id,
            },
            OrderStatus::Shipped => PushEvent::Shipped {
                order_id,
                customer_id,
            },
            OrderStatus::Delivered => PushEvent::Delivered {
                order_id,
                customer_id,
            },
            OrderStatus::Cancelled => PushEvent::Cancelled {
                order_id,
                customer_id,
            },
        }
    }

    /// The room a livechat event is about.
    pub fn room(&self) -> Option<&RoomView> {
        match self {
            PushEvent::NewMessage { room, .. }
            | PushEvent::AgentJoined { room, .. }
            | PushEvent::AgentConcluded { room, .. }
            | PushEvent::ChatClosed { room }
            | PushEvent::NewChatRoom { room }
            | PushEvent::CustomerDisconnected { room, .. }
            | PushEvent::RoomReactivated { room }
            | PushEvent::RoomReturnedToWaiting { room, .. } => Some(room),
            _ => None,
        }
    }

    /// The ticket a contacts event is about.
    pub fn ticket(&self) -> Option<&TicketView> {
        match self {
            PushEvent::NewSupportTicket { ticket }
            | PushEvent::SupportTicketMessage { ticket, .. }
            | PushEvent::TicketAgentAssigned { ticket, .. }
            | PushEvent::TicketStatusUpdated { ticket, .. } => Some(ticket),
            _ => None,
        }
    }
}

/// A decoded frame from the push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// The `connected` frame every stream starts with.
    Handshake,
    Event(PushEvent),
    /// A well-formed frame whose type this build does not know about.
    Unrecognized { event_type: String, payload: Value },
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    MissingType,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecodeError::Json(err) => write!(f, "malformed push frame: {err}"),
            DecodeError::MissingType => write!(f, "push frame has no string `type` field"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

impl Incoming {
    pub fn decode(data: &str) -> Result<Incoming, DecodeError> {
        let payload: Value = serde_json::from_str(data)?;
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if event_type == HANDSHAKE_EVENT_TYPE {
            return Ok(Incoming::Handshake);
        }

        match serde_json::from_value::<PushEvent>(payload.clone()) {
            Ok(event) => Ok(Incoming::Event(event)),
            // A type we know with a payload we can't read is still surfaced,
            // just without typing.
            Err(err) => {
                log::warn!("Push event {event_type} did not match its schema: {err}");
                Ok(Incoming::Unrecognized {
                    event_type,
                    payload,
                })
            }
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Incoming::Handshake => HANDSHAKE_EVENT_TYPE,
            Incoming::Event(event) => event.event_type(),
            Incoming::Unrecognized { event_type, .. } => event_type,
        }
    }

    pub fn category(&self) -> Category {
        category_for(self.event_type())
    }
}

/// The handshake frame body.
pub fn handshake_payload() -> String {
    serde_json::json!({ "type": HANDSHAKE_EVENT_TYPE }).to_string()
}
