use super::error::Error;
use chrono::Utc;
use entity::chat_rooms::{ActiveModel, Column, Entity, Model};
use entity::{Id, Priority, RoomStatus};
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder};

use log::*;

/// The state a room should be moved to by [`compare_and_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoomChange {
    pub status: RoomStatus,
    pub agent_id: Option<Id>,
    pub closed_at: Option<DateTimeWithTimeZone>,
}

pub async fn create(
    db: &impl ConnectionTrait,
    customer_id: Id,
    priority: Priority,
) -> Result<Model, Error> {
    let now = Utc::now();

    let room = ActiveModel {
        id: Set(Id::new_v4()),
        customer_id: Set(customer_id),
        agent_id: Set(None),
        status: Set(RoomStatus::Waiting),
        priority: Set(priority),
        created_at: Set(now.into()),
        modified_at: Set(now.into()),
        closed_at: Set(None),
    };

    debug!("New chat room to be inserted: {room:?}");

    Ok(room.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// The customer's room that is not concluded, if any.
pub async fn find_open_by_customer(
    db: &impl ConnectionTrait,
    customer_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::CustomerId.eq(customer_id))
        .filter(Column::Status.ne(RoomStatus::Concluded))
        .order_by_desc(Column::ModifiedAt)
        .one(db)
        .await?)
}

pub async fn find_by_customer(
    db: &impl ConnectionTrait,
    customer_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::CustomerId.eq(customer_id))
        .order_by_desc(Column::ModifiedAt)
        .all(db)
        .await?)
}

pub async fn find_all(db: &impl ConnectionTrait) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::ModifiedAt)
        .all(db)
        .await?)
}

/// Applies `change` only if the row still has the status and agent that
/// `current` was read with. Returns the updated row, or a `RecordNotUpdated`
/// error when another writer got there first.
pub async fn compare_and_set(
    db: &impl ConnectionTrait,
    current: &Model,
    change: RoomChange,
) -> Result<Model, Error> {
    let agent_matches = match current.agent_id {
        Some(agent_id) => Column::AgentId.eq(agent_id),
        None => Column::AgentId.is_null(),
    };

    let updated = Entity::update_many()
        .set(ActiveModel {
            status: Set(change.status),
            agent_id: Set(change.agent_id),
            closed_at: Set(change.closed_at),
            modified_at: Set(Utc::now().into()),
            ..Default::default()
        })
        .filter(Column::Id.eq(current.id))
        .filter(Column::Status.eq(current.status))
        .filter(agent_matches)
        .exec_with_returning(db)
        .await?;

    match updated.into_iter().next() {
        Some(room) => Ok(room),
        None => {
            debug!(
                "Chat room {} changed since it was read as {}",
                current.id, current.status
            );
            Err(Error::not_updated())
        }
    }
}
