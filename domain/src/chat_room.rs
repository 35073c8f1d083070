use crate::error::Error;
use crate::user::{require_customer, require_non_empty, require_staff};
use crate::{ChatMessageView, DomainEvent, EventPublisher, Id, Priority, RoomView};
use chrono::Utc;
use entity_api::chat_room::RoomChange;
use entity_api::{ai_message, chat_message, chat_room, chat_rooms, user, users};
use entity_api::{RoomStatus, SenderType};
use events::schema::merge_timelines;
use events::RoomTransition;
use log::*;
use sea_orm::{DatabaseConnection, TransactionTrait};

/// Opens a waiting room for the customer. A customer who already has a room
/// that is not concluded gets that room back instead of a second one.
///
/// The lookup and the insert run in one transaction holding the customer
/// row lock, so concurrent opens from the same customer see each other.
pub async fn open(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    customer_id: Id,
    priority: Priority,
) -> Result<RoomView, Error> {
    let txn = db.begin().await?;

    let customer = user::find_for_update(&txn, customer_id).await?;
    require_customer(&customer, "open a chat")?;

    if let Some(existing) = chat_room::find_open_by_customer(&txn, customer_id).await? {
        txn.commit().await?;
        debug!("Customer {customer_id} already has open room {}", existing.id);
        return Ok(existing.into());
    }

    let room = chat_room::create(&txn, customer_id, priority).await?;
    txn.commit().await?;

    let room: RoomView = room.into();
    info!("Chat room {} opened by customer {customer_id}", room.id);

    event_publisher
        .publish(DomainEvent::RoomOpened { room: room.clone() })
        .await;

    Ok(room)
}

/// Assigns a waiting room to the agent. When two agents race for the same
/// room exactly one of them succeeds; the other gets a conflict.
pub async fn claim(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    agent_id: Id,
) -> Result<RoomView, Error> {
    let agent = user::find_by_id(db, agent_id).await?;
    require_staff(&agent, "claim a chat")?;

    let room = chat_room::find_by_id(db, room_id).await?;
    if room.status == RoomStatus::Active {
        return match room.agent_id {
            Some(current) if current == agent_id => Ok(room.into()),
            _ => Err(Error::conflict("chat was already claimed by another agent")),
        };
    }

    transition(db, event_publisher, room, agent_id, RoomTransition::Claim).await
}

/// The assigned agent hands the room back to the waiting queue.
pub async fn return_to_queue(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    agent_id: Id,
) -> Result<RoomView, Error> {
    let room = chat_room::find_by_id(db, room_id).await?;
    require_assigned_agent(&room, agent_id)?;

    transition(
        db,
        event_publisher,
        room,
        agent_id,
        RoomTransition::ReturnToQueue,
    )
    .await
}

pub async fn conclude(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    agent_id: Id,
) -> Result<RoomView, Error> {
    let room = chat_room::find_by_id(db, room_id).await?;
    require_assigned_agent(&room, agent_id)?;

    transition(db, event_publisher, room, agent_id, RoomTransition::Conclude).await
}

pub async fn customer_disconnect(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    customer_id: Id,
) -> Result<RoomView, Error> {
    let room = chat_room::find_by_id(db, room_id).await?;
    require_room_customer(&room, customer_id)?;

    transition(
        db,
        event_publisher,
        room,
        customer_id,
        RoomTransition::CustomerDisconnect,
    )
    .await
}

pub async fn customer_close(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    customer_id: Id,
) -> Result<RoomView, Error> {
    let room = chat_room::find_by_id(db, room_id).await?;
    require_room_customer(&room, customer_id)?;

    transition(
        db,
        event_publisher,
        room,
        customer_id,
        RoomTransition::CustomerClose,
    )
    .await
}

/// The customer re-engages with a waiting or concluded room, putting it back
/// in front of the agents.
pub async fn reactivate(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    customer_id: Id,
) -> Result<RoomView, Error> {
    let room = chat_room::find_by_id(db, room_id).await?;
    require_room_customer(&room, customer_id)?;

    transition(
        db,
        event_publisher,
        room,
        customer_id,
        RoomTransition::Reactivate,
    )
    .await
}

async fn transition(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room: chat_rooms::Model,
    actor_id: Id,
    transition: RoomTransition,
) -> Result<RoomView, Error> {
    let status = room.status.apply(transition)?;
    let agent_id = transition.assigns_agent().then_some(actor_id);
    let closed_at = if status == RoomStatus::Concluded {
        Some(Utc::now().into())
    } else {
        room.closed_at
    };
    let previous_agent_id = room.agent_id;

    let updated = chat_room::compare_and_set(
        db,
        &room,
        RoomChange {
            status,
            agent_id,
            closed_at,
        },
    )
    .await?;
    let room: RoomView = updated.into();

    info!(
        "Chat room {} moved to {} by {transition} from {actor_id}",
        room.id, room.status
    );

    event_publisher
        .publish(DomainEvent::RoomTransitioned {
            room: room.clone(),
            transition,
            actor_id,
            previous_agent_id,
        })
        .await;

    Ok(room)
}

/// Appends a message to the live transcript. Customers write to their own
/// room; staff only to rooms assigned to them.
pub async fn post_message(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    sender_id: Id,
    message: String,
) -> Result<ChatMessageView, Error> {
    require_non_empty(&message, "message")?;

    let sender = user::find_by_id(db, sender_id).await?;
    let room = chat_room::find_by_id(db, room_id).await?;
    if room.status == RoomStatus::Concluded {
        return Err(Error::precondition("chat has been concluded"));
    }

    let sender_type = if sender.role.is_staff() {
        require_assigned_agent(&room, sender_id)?;
        SenderType::Agent
    } else {
        require_room_customer(&room, sender_id)?;
        SenderType::Customer
    };

    let message: ChatMessageView =
        chat_message::create(db, room.id, sender_type, Some(sender_id), message)
            .await?
            .into();

    event_publisher
        .publish(DomainEvent::RoomMessagePosted {
            room: room.into(),
            message: message.clone(),
        })
        .await;

    Ok(message)
}

/// Records one turn of the AI assistant conversation attached to a room.
pub async fn post_ai_message(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    room_id: Id,
    sender_type: SenderType,
    message: String,
) -> Result<ChatMessageView, Error> {
    require_non_empty(&message, "message")?;
    if !matches!(sender_type, SenderType::Customer | SenderType::Ai) {
        return Err(Error::precondition(
            "AI transcript entries come from the customer or the assistant",
        ));
    }

    let room = chat_room::find_by_id(db, room_id).await?;
    if room.status == RoomStatus::Concluded {
        return Err(Error::precondition("chat has been concluded"));
    }

    let message: ChatMessageView = ai_message::create(db, room.id, sender_type, message)
        .await?
        .into();

    event_publisher
        .publish(DomainEvent::RoomMessagePosted {
            room: room.into(),
            message: message.clone(),
        })
        .await;

    Ok(message)
}

pub async fn live_messages(
    db: &DatabaseConnection,
    room_id: Id,
    viewer_id: Id,
) -> Result<Vec<ChatMessageView>, Error> {
    let room = find_visible(db, room_id, viewer_id).await?;

    Ok(chat_message::find_by_room(db, room.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

pub async fn ai_messages(
    db: &DatabaseConnection,
    room_id: Id,
    viewer_id: Id,
) -> Result<Vec<ChatMessageView>, Error> {
    let room = find_visible(db, room_id, viewer_id).await?;

    Ok(ai_message::find_by_room(db, room.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Both transcripts of a room as one timeline ordered by creation time.
pub async fn unified_messages(
    db: &DatabaseConnection,
    room_id: Id,
    viewer_id: Id,
) -> Result<Vec<ChatMessageView>, Error> {
    let room = find_visible(db, room_id, viewer_id).await?;

    let ai: Vec<ChatMessageView> = ai_message::find_by_room(db, room.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let live: Vec<ChatMessageView> = chat_message::find_by_room(db, room.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(merge_timelines(&ai, &live))
}

/// Customers see their own rooms, staff see every room.
pub async fn find_for_user(db: &DatabaseConnection, user_id: Id) -> Result<Vec<RoomView>, Error> {
    let viewer = user::find_by_id(db, user_id).await?;

    let rooms = if viewer.role.is_staff() {
        chat_room::find_all(db).await?
    } else {
        chat_room::find_by_customer(db, viewer.id).await?
    };

    Ok(rooms.into_iter().map(Into::into).collect())
}

async fn find_visible(
    db: &DatabaseConnection,
    room_id: Id,
    viewer_id: Id,
) -> Result<chat_rooms::Model, Error> {
    let viewer = user::find_by_id(db, viewer_id).await?;
    let room = chat_room::find_by_id(db, room_id).await?;
    require_can_view(&viewer, &room)?;
    Ok(room)
}

fn require_can_view(viewer: &users::Model, room: &chat_rooms::Model) -> Result<(), Error> {
    if viewer.role.is_staff() || viewer.id == room.customer_id {
        Ok(())
    } else {
        Err(Error::precondition("chat belongs to another customer"))
    }
}

fn require_assigned_agent(room: &chat_rooms::Model, agent_id: Id) -> Result<(), Error> {
    if room.agent_id == Some(agent_id) {
        Ok(())
    } else {
        Err(Error::precondition(
            "only the agent assigned to this chat may do that",
        ))
    }
}

fn require_room_customer(room: &chat_rooms::Model, customer_id: Id) -> Result<(), Error> {
    if room.customer_id == customer_id {
        Ok(())
    } else {
        Err(Error::precondition("chat belongs to another customer"))
    }
}
