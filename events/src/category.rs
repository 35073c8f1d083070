//! The fixed event-type → category table.
//!
//! Server routing and client dispatch both classify events through
//! [`category_for`], so the two sides always agree on where an event goes.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Livechat,
    Notifications,
    Contacts,
    General,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Livechat,
        Category::Notifications,
        Category::Contacts,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Livechat => "livechat",
            Category::Notifications => "notifications",
            Category::Contacts => "contacts",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown event category: {}", self.0)
    }
}

impl StdError for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == name)
            .ok_or_else(|| UnknownCategory(name.to_string()))
    }
}

/// Type tag of the handshake frame written when a push stream opens.
pub const HANDSHAKE_EVENT_TYPE: &str = "connected";

/// Every event type with a dedicated category. Anything absent is `General`.
pub const EVENT_CATEGORIES: &[(&str, Category)] = &[
    ("new_message", Category::Livechat),
    ("agent_joined", Category::Livechat),
    ("agent_concluded", Category::Livechat),
    ("chat_closed", Category::Livechat),
    ("new_chat_room", Category::Livechat),
    ("customer_disconnected", Category::Livechat),
    ("room_reactivated", Category::Livechat),
    ("room_returned_to_waiting", Category::Livechat),
    ("processing", Category::Notifications),
    ("shipped", Category::Notifications),
    ("delivered", Category::Notifications),
    ("cancelled", Category::Notifications),
    ("new_support_ticket", Category::Contacts),
    ("support_ticket_message", Category::Contacts),
    ("ticket_agent_assigned", Category::Contacts),
    ("ticket_status_updated", Category::Contacts),
];

pub fn category_for(event_type: &str) -> Category {
    EVENT_CATEGORIES
        .iter()
        .find(|(known, _)| *known == event_type)
        .map(|(_, category)| *category)
        .unwrap_or(Category::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_livechat_type_maps_to_livechat() {
        for event_type in [
            "new_message",
            "agent_joined",
            "agent_concluded",
            "chat_closed",
            "new_chat_room",
            "customer_disconnected",
            "room_reactivated",
            "room_returned_to_waiting",
        ] {
            assert_eq!(category_for(event_type), Category::Livechat, "{event_type}");
        }
    }

    #[test]
    fn order_and_ticket_types_map_to_their_categories() {
        for event_type in ["processing", "shipped", "delivered", "cancelled"] {
            assert_eq!(category_for(event_type), Category::Notifications);
        }
        for event_type in [
            "new_support_ticket",
            "support_ticket_message",
            "ticket_agent_assigned",
            "ticket_status_updated",
        ] {
            assert_eq!(category_for(event_type), Category::Contacts);
        }
    }

    #[test]
    fn unmatched_types_fall_back_to_general() {
        assert_eq!(category_for("force_logout"), Category::General);
        assert_eq!(category_for("something_new"), Category::General);
        assert_eq!(category_for(""), Category::General);
        assert_eq!(category_for("NEW_MESSAGE"), Category::General);
    }

    #[test]
    fn table_has_no_duplicate_types() {
        let mut seen = std::collections::HashSet::new();
        for (event_type, _) in EVENT_CATEGORIES {
            assert!(seen.insert(*event_type), "duplicate entry {event_type}");
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn category_names_round_trip_and_reject_unknown() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!(
            "billing".parse::<Category>(),
            Err(UnknownCategory("billing".to_string()))
        );
    }
}
