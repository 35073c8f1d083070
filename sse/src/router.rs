//! Audience rules: which users an event is delivered to.

use crate::message::MessageScope;
use events::schema::TicketStatus;
use events::{Category, Id, PushEvent};

/// Resolves the audience of an event from its category and payload.
///
/// * livechat: the room's customer, its assigned agent and the agent who just
///   lost the room, plus all connected staff (they watch the queue).
/// * notifications: the customer the order belongs to.
/// * contacts: the ticket's customer and assigned agent, plus all connected
///   staff while the ticket is unassigned or open, or is just being claimed.
/// * general: `force_logout` to its user; `system_notice` to a role or to all.
pub fn audience_for(event: &PushEvent) -> MessageScope {
    match event.category() {
        Category::Livechat => livechat_audience(event),
        Category::Notifications => notification_audience(event),
        Category::Contacts => contacts_audience(event),
        Category::General => general_audience(event),
    }
}

fn livechat_audience(event: &PushEvent) -> MessageScope {
    let mut user_ids = Vec::new();

    if let Some(room) = event.room() {
        user_ids.push(room.customer_id);
        user_ids.extend(room.agent_id);
    }

    match event {
        PushEvent::AgentJoined { agent_id, .. } | PushEvent::AgentConcluded { agent_id, .. } => {
            user_ids.push(*agent_id)
        }
        PushEvent::CustomerDisconnected {
            previous_agent_id, ..
        }
        | PushEvent::RoomReturnedToWaiting {
            previous_agent_id, ..
        } => user_ids.extend(*previous_agent_id),
        _ => {}
    }

    MessageScope::UsersAndStaff {
        user_ids: dedup(user_ids),
    }
}

fn notification_audience(event: &PushEvent) -> MessageScope {
    let user_ids = match event {
        PushEvent::Processing { customer_id, .. }
        | PushEvent::Shipped { customer_id, .. }
        | PushEvent::Delivered { customer_id, .. }
        | PushEvent::Cancelled { customer_id, .. } => vec![*customer_id],
        _ => Vec::new(),
    };

    MessageScope::Users { user_ids }
}

fn contacts_audience(event: &PushEvent) -> MessageScope {
    let Some(ticket) = event.ticket() else {
        return MessageScope::Users {
            user_ids: Vec::new(),
        };
    };

    let mut user_ids = vec![ticket.customer_id];
    user_ids.extend(ticket.agent_id);
    let user_ids = dedup(user_ids);

    let in_queue = ticket.agent_id.is_none() || ticket.status == TicketStatus::Open;
    // Staff must see a ticket leave the shared queue when it is claimed
    let leaving_queue = matches!(event, PushEvent::TicketAgentAssigned { .. });

    if in_queue || leaving_queue {
        MessageScope::UsersAndStaff { user_ids }
    } else {
        MessageScope::Users { user_ids }
    }
}

fn general_audience(event: &PushEvent) -> MessageScope {
    match event {
        PushEvent::ForceLogout { user_id, .. } => MessageScope::Users {
            user_ids: vec![*user_id],
        },
        PushEvent::SystemNotice {
            role: Some(role), ..
        } => MessageScope::Role { role: *role },
        _ => MessageScope::Broadcast,
    }
}

fn dedup(mut user_ids: Vec<Id>) -> Vec<Id> {
    let mut seen = std::collections::HashSet::new();
    user_ids.retain(|id| seen.insert(*id));
    user_ids
}
