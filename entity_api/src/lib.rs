use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub use entity::{
    ai_messages, chat_messages, chat_rooms, support_tickets, ticket_messages, users, Id,
    Priority, Role, RoomStatus, SenderType, TicketStatus,
};

pub mod ai_message;
pub mod chat_message;
pub mod chat_room;
pub mod error;
pub mod support_ticket;
pub mod ticket_message;
pub mod user;

async fn seed_user(
    db: &DatabaseConnection,
    email: &str,
    display_name: &str,
    role: Role,
) -> Result<users::Model, error::Error> {
    let now = Utc::now();

    Ok(users::ActiveModel {
        id: Set(Id::new_v4()),
        email: Set(email.to_owned()),
        display_name: Set(Some(display_name.to_owned())),
        role: Set(role),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?)
}

/// Fills an empty database with a small support team, a couple of customers,
/// a room waiting in the queue and an open ticket.
pub async fn seed_database(db: &DatabaseConnection) -> Result<(), error::Error> {
    let now = Utc::now();

    seed_user(db, "admin@supportdesk.dev", "Admin User", Role::Admin).await?;
    seed_user(db, "alice.agent@supportdesk.dev", "Alice", Role::Agent).await?;
    seed_user(db, "bob.agent@supportdesk.dev", "Bob", Role::Agent).await?;
    let carol = seed_user(db, "carol@example.com", "Carol", Role::Customer).await?;
    let dave = seed_user(db, "dave@example.com", "Dave", Role::Customer).await?;

    let room = chat_room::create(db, carol.id, Priority::Normal).await?;

    // The assistant talked to Carol before she asked for a human
    ai_messages::ActiveModel {
        id: Set(Id::new_v4()),
        room_id: Set(room.id),
        sender_type: Set(SenderType::Customer),
        message: Set("Where is my order?".to_owned()),
        created_at: Set((now - Duration::minutes(3)).into()),
    }
    .insert(db)
    .await?;
    ai_messages::ActiveModel {
        id: Set(Id::new_v4()),
        room_id: Set(room.id),
        sender_type: Set(SenderType::Ai),
        message: Set("I'll connect you with an agent who can check.".to_owned()),
        created_at: Set((now - Duration::minutes(2)).into()),
    }
    .insert(db)
    .await?;

    let ticket = support_ticket::create(
        db,
        dave.id,
        "Refund for damaged item".to_owned(),
        "billing".to_owned(),
        Priority::High,
    )
    .await?;
    ticket_message::create(
        db,
        ticket.id,
        SenderType::Customer,
        Some(dave.id),
        "The mug arrived cracked, can I get a refund?".to_owned(),
    )
    .await?;

    Ok(())
}
