use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler, EventType, PushEvent, RoomTransition, TicketTransition};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to push events and routing them
/// to the users they concern.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let push_event = to_push_event(event);
        debug!("Routing push event {}", push_event.event_type());
        self.sse_manager.route(push_event);
    }
}

/// The client-facing event for a domain event. Each domain event maps to
/// exactly one push event.
pub fn to_push_event(event: &DomainEvent) -> PushEvent {
    match event {
        DomainEvent::RoomOpened { room } => PushEvent::NewChatRoom { room: room.clone() },

        DomainEvent::RoomTransitioned {
            room,
            transition,
            actor_id,
            previous_agent_id,
        } => {
            let room = room.clone();
            let previous_agent_id = *previous_agent_id;
            match transition {
                RoomTransition::Claim => PushEvent::AgentJoined {
                    room,
                    agent_id: *actor_id,
                },
                RoomTransition::ReturnToQueue => PushEvent::RoomReturnedToWaiting {
                    room,
                    previous_agent_id,
                },
                RoomTransition::Conclude => PushEvent::AgentConcluded {
                    room,
                    agent_id: previous_agent_id.unwrap_or(*actor_id),
                },
                RoomTransition::CustomerDisconnect => PushEvent::CustomerDisconnected {
                    room,
                    previous_agent_id,
                },
                RoomTransition::CustomerClose => PushEvent::ChatClosed { room },
                RoomTransition::Reactivate => PushEvent::RoomReactivated { room },
            }
        }

        DomainEvent::RoomMessagePosted { room, message } => PushEvent::NewMessage {
            room: room.clone(),
            message: message.clone(),
        },

        DomainEvent::TicketOpened { ticket } => PushEvent::NewSupportTicket {
            ticket: ticket.clone(),
        },

        DomainEvent::TicketTransitioned {
            ticket,
            transition: TicketTransition::Claim,
            actor_id,
            ..
        } => PushEvent::TicketAgentAssigned {
            ticket: ticket.clone(),
            agent_id: *actor_id,
        },

        DomainEvent::TicketTransitioned {
            ticket,
            previous_status,
            actor_id,
            ..
        } => PushEvent::TicketStatusUpdated {
            ticket: ticket.clone(),
            previous_status: *previous_status,
            changed_by: *actor_id,
        },

        DomainEvent::TicketMessagePosted { ticket, message } => PushEvent::SupportTicketMessage {
            ticket: ticket.clone(),
            message: message.clone(),
        },

        DomainEvent::OrderStatusChanged {
            order_id,
            customer_id,
            status,
        } => PushEvent::order_status(*status, *order_id, *customer_id),

        DomainEvent::NoticeBroadcast { message, role } => PushEvent::SystemNotice {
            message: message.clone(),
            role: *role,
        },

        DomainEvent::SessionRevoked { user_id, reason } => PushEvent::ForceLogout {
            user_id: *user_id,
            reason: reason.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use events::schema::{
        OrderStatus, Priority, Role, RoomStatus, RoomView, TicketStatus, TicketView,
    };
    use events::{EventPublisher, Id};
    use tokio::sync::mpsc::unbounded_channel;

    fn room(status: RoomStatus, agent_id: Option<Id>) -> RoomView {
        let now = Utc::now();
        RoomView {
            id: Id::new_v4(),
            customer_id: Id::new_v4(),
            agent_id,
            status,
            priority: Priority::Urgent,
            created_at: now,
            modified_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn room_transitions_map_to_their_push_types() {
        let agent = Id::new_v4();
        let cases = [
            (RoomTransition::Claim, "agent_joined"),
            (RoomTransition::ReturnToQueue, "room_returned_to_waiting"),
            (RoomTransition::Conclude, "agent_concluded"),
            (RoomTransition::CustomerDisconnect, "customer_disconnected"),
            (RoomTransition::CustomerClose, "chat_closed"),
            (RoomTransition::Reactivate, "room_reactivated"),
        ];

        for (transition, expected) in cases {
            let event = DomainEvent::RoomTransitioned {
                room: room(RoomStatus::Waiting, None),
                transition,
                actor_id: agent,
                previous_agent_id: Some(agent),
            };
            assert_eq!(to_push_event(&event).event_type(), expected);
        }
    }

    #[test]
    fn conclude_names_the_agent_that_left() {
        let agent = Id::new_v4();
        let event = DomainEvent::RoomTransitioned {
            room: room(RoomStatus::Waiting, None),
            transition: RoomTransition::Conclude,
            actor_id: agent,
            previous_agent_id: Some(agent),
        };

        match to_push_event(&event) {
            PushEvent::AgentConcluded { agent_id, .. } => assert_eq!(agent_id, agent),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ticket_claim_and_status_changes_are_distinct_events() {
        let agent = Id::new_v4();
        let now = Utc::now();
        let ticket = TicketView {
            id: Id::new_v4(),
            customer_id: Id::new_v4(),
            agent_id: Some(agent),
            status: TicketStatus::InProgress,
            subject: "Broken zipper".to_string(),
            priority: Priority::Low,
            category: "returns".to_string(),
            created_at: now,
            modified_at: now,
            resolved_at: None,
        };

        let claimed = to_push_event(&DomainEvent::TicketTransitioned {
            ticket: ticket.clone(),
            transition: TicketTransition::Claim,
            previous_status: TicketStatus::Open,
            actor_id: agent,
        });
        let resolved = to_push_event(&DomainEvent::TicketTransitioned {
            ticket,
            transition: TicketTransition::Resolve,
            previous_status: TicketStatus::InProgress,
            actor_id: agent,
        });

        assert_eq!(claimed.event_type(), "ticket_agent_assigned");
        assert_eq!(resolved.event_type(), "ticket_status_updated");
    }

    #[test]
    fn order_status_maps_to_the_matching_notification() {
        let event = DomainEvent::OrderStatusChanged {
            order_id: Id::new_v4(),
            customer_id: Id::new_v4(),
            status: OrderStatus::Cancelled,
        };

        assert_eq!(to_push_event(&event).event_type(), "cancelled");
    }

    #[tokio::test]
    async fn published_events_reach_connected_users() {
        let manager = Arc::new(Manager::new());
        let publisher =
            EventPublisher::new().with_handler(Arc::new(SseDomainEventHandler::new(manager.clone())));
        let user_id = Id::new_v4();
        let (tx, mut rx) = unbounded_channel();
        manager.register_connection(user_id, Role::Customer, tx);

        publisher
            .publish(DomainEvent::SessionRevoked {
                user_id,
                reason: "password changed".to_string(),
            })
            .await;

        assert!(rx.try_recv().is_ok());
    }
}
