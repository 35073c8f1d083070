pub use super::ai_messages::Entity as AiMessages;
pub use super::chat_messages::Entity as ChatMessages;
pub use super::chat_rooms::Entity as ChatRooms;
pub use super::support_tickets::Entity as SupportTickets;
pub use super::ticket_messages::Entity as TicketMessages;
pub use super::users::Entity as Users;
