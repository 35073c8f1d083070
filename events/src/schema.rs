//! Entity views shared by the server and its clients.
//!
//! The enums in this module double as database enums when the `persistence`
//! feature is enabled, so the wire representation and the stored
//! representation can never drift apart.

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(
    feature = "persistence",
    derive(sea_orm::EnumIter, sea_orm::DeriveActiveEnum),
    sea_orm(rs_type = "String", db_type = "Enum", enum_name = "role")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "customer"))]
    Customer,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "agent"))]
    Agent,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "admin"))]
    Admin,
}

impl Role {
    /// Agents and admins both work the support queues.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(fmt, "customer"),
            Role::Agent => write!(fmt, "agent"),
            Role::Admin => write!(fmt, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(
    feature = "persistence",
    derive(sea_orm::EnumIter, sea_orm::DeriveActiveEnum),
    sea_orm(rs_type = "String", db_type = "Enum", enum_name = "room_status")
)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "waiting"))]
    Waiting,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "concluded"))]
    Concluded,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(fmt, "waiting"),
            RoomStatus::Active => write!(fmt, "active"),
            RoomStatus::Concluded => write!(fmt, "concluded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(
    feature = "persistence",
    derive(sea_orm::EnumIter, sea_orm::DeriveActiveEnum),
    sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_status")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "open"))]
    Open,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "in_progress"))]
    InProgress,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "waiting_customer"))]
    WaitingCustomer,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "resolved"))]
    Resolved,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "closed"))]
    Closed,
}

impl TicketStatus {
    pub const NON_TERMINAL: [TicketStatus; 3] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::WaitingCustomer,
    ];

    /// Resolved and closed tickets no longer count against a customer's cap.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(fmt, "open"),
            TicketStatus::InProgress => write!(fmt, "in_progress"),
            TicketStatus::WaitingCustomer => write!(fmt, "waiting_customer"),
            TicketStatus::Resolved => write!(fmt, "resolved"),
            TicketStatus::Closed => write!(fmt, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(
    feature = "persistence",
    derive(sea_orm::EnumIter, sea_orm::DeriveActiveEnum),
    sea_orm(rs_type = "String", db_type = "Enum", enum_name = "priority")
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "low"))]
    Low,
    #[default]
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "normal"))]
    Normal,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "high"))]
    High,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "urgent"))]
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "persistence",
    derive(sea_orm::EnumIter, sea_orm::DeriveActiveEnum),
    sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sender_type")
)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "customer"))]
    Customer,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "agent"))]
    Agent,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "system"))]
    System,
    #[cfg_attr(feature = "persistence", sea_orm(string_value = "ai"))]
    Ai,
}

/// Which transcript a room message was read from. Declaration order is the
/// tie-break order for messages sharing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Ai,
    Live,
}

/// Order lifecycle states that produce customer notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: Id,
    pub customer_id: Id,
    pub agent_id: Option<Id>,
    pub status: RoomStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    pub id: Id,
    pub customer_id: Id,
    pub agent_id: Option<Id>,
    pub status: TicketStatus,
    pub subject: String,
    pub priority: Priority,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageView {
    pub id: Id,
    pub room_id: Id,
    pub sender_type: SenderType,
    pub sender_id: Option<Id>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub source: MessageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMessageView {
    pub id: Id,
    pub ticket_id: Id,
    pub sender_type: SenderType,
    pub sender_id: Option<Id>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: Id,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

/// Merges the AI and live transcripts of a room into one timeline.
///
/// Every entry is re-tagged with the transcript it came from, then the
/// combined list is stably sorted by `created_at`, with AI entries ahead of
/// live ones on identical timestamps. The result depends only on the two
/// inputs.
pub fn merge_timelines(ai: &[ChatMessageView], live: &[ChatMessageView]) -> Vec<ChatMessageView> {
    let mut merged: Vec<ChatMessageView> = ai
        .iter()
        .cloned()
        .map(|message| ChatMessageView {
            source: MessageSource::Ai,
            ..message
        })
        .chain(live.iter().cloned().map(|message| ChatMessageView {
            source: MessageSource::Live,
            ..message
        }))
        .collect();

    merged.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.source.cmp(&b.source))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(room_id: Id, seconds: i64, body: &str, source: MessageSource) -> ChatMessageView {
        let base = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ChatMessageView {
            id: Id::new_v4(),
            room_id,
            sender_type: SenderType::Customer,
            sender_id: None,
            message: body.to_string(),
            created_at: base + Duration::seconds(seconds),
            source,
        }
    }

    #[test]
    fn merge_timelines_orders_by_created_at_across_sources() {
        let room_id = Id::new_v4();
        let ai = vec![
            message(room_id, 0, "hello bot", MessageSource::Ai),
            message(room_id, 20, "bot answer", MessageSource::Ai),
        ];
        let live = vec![
            message(room_id, 10, "agent here", MessageSource::Live),
            message(room_id, 30, "thanks", MessageSource::Live),
        ];

        let merged = merge_timelines(&ai, &live);
        let bodies: Vec<&str> = merged.iter().map(|m| m.message.as_str()).collect();

        assert_eq!(bodies, vec!["hello bot", "agent here", "bot answer", "thanks"]);
        assert!(merged
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn merge_timelines_is_independent_of_input_order_and_idempotent() {
        let room_id = Id::new_v4();
        let ai = vec![
            message(room_id, 5, "a", MessageSource::Ai),
            message(room_id, 1, "b", MessageSource::Ai),
        ];
        let live = vec![
            message(room_id, 3, "c", MessageSource::Live),
            message(room_id, 0, "d", MessageSource::Live),
        ];
        let mut ai_reversed = ai.clone();
        ai_reversed.reverse();
        let mut live_reversed = live.clone();
        live_reversed.reverse();

        let first = merge_timelines(&ai, &live);
        let second = merge_timelines(&ai, &live);
        let shuffled = merge_timelines(&ai_reversed, &live_reversed);

        assert_eq!(first, second);
        assert_eq!(first, shuffled);
    }

    #[test]
    fn merge_timelines_retags_source_and_breaks_ties_ai_first() {
        let room_id = Id::new_v4();
        // Mis-tagged on purpose: the merge decides the source by origin list
        let ai = vec![message(room_id, 7, "from ai", MessageSource::Live)];
        let live = vec![message(room_id, 7, "from live", MessageSource::Ai)];

        let merged = merge_timelines(&ai, &live);

        assert_eq!(merged[0].message, "from ai");
        assert_eq!(merged[0].source, MessageSource::Ai);
        assert_eq!(merged[1].message, "from live");
        assert_eq!(merged[1].source, MessageSource::Live);
    }

    #[test]
    fn ticket_status_terminal_states() {
        assert!(TicketStatus::Resolved.is_terminal());
        assert!(TicketStatus::Closed.is_terminal());
        for status in TicketStatus::NON_TERMINAL {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn enums_serialize_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::WaitingCustomer).unwrap(),
            "\"waiting_customer\""
        );
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&MessageSource::Ai).unwrap(), "\"ai\"");
    }
}
