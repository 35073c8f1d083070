use uuid::Uuid;

pub mod prelude;

pub mod ai_messages;
pub mod chat_messages;
pub mod chat_rooms;
pub mod support_tickets;
pub mod ticket_messages;
pub mod users;

// Enums are defined once, next to the wire schema, and mapped onto the
// database enum types through the `persistence` feature.
pub use events::schema::{Priority, Role, RoomStatus, SenderType, TicketStatus};

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;

/// Converts a stored timestamp to the UTC form used on the wire.
pub(crate) fn utc(
    timestamp: sea_orm::prelude::DateTimeWithTimeZone,
) -> chrono::DateTime<chrono::Utc> {
    timestamp.with_timezone(&chrono::Utc)
}
