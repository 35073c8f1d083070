use super::error::Error;
use chrono::Utc;
use entity::support_tickets::{ActiveModel, Column, Entity, Model};
use entity::{Id, Priority, TicketStatus};
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait, PaginatorTrait, QueryOrder};

use log::*;

/// The state a ticket should be moved to by [`compare_and_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct TicketChange {
    pub status: TicketStatus,
    pub agent_id: Option<Id>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
}

pub async fn create(
    db: &impl ConnectionTrait,
    customer_id: Id,
    subject: String,
    category: String,
    priority: Priority,
) -> Result<Model, Error> {
    let now = Utc::now();

    let ticket = ActiveModel {
        id: Set(Id::new_v4()),
        customer_id: Set(customer_id),
        agent_id: Set(None),
        status: Set(TicketStatus::Open),
        subject: Set(subject),
        priority: Set(priority),
        category: Set(category),
        created_at: Set(now.into()),
        modified_at: Set(now.into()),
        resolved_at: Set(None),
    };

    debug!("New support ticket to be inserted: {ticket:?}");

    Ok(ticket.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Number of tickets the customer holds that are neither resolved nor closed.
pub async fn count_open_by_customer(
    db: &impl ConnectionTrait,
    customer_id: Id,
) -> Result<u64, Error> {
    Ok(Entity::find()
        .filter(Column::CustomerId.eq(customer_id))
        .filter(Column::Status.is_in(TicketStatus::NON_TERMINAL))
        .count(db)
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
/// `current` was read with.
pub async fn compare_and_set(
    db: &impl ConnectionTrait,
    current: &Model,
    change: TicketChange,
) -> Result<Model, Error> {
    let agent_matches = match current.agent_id {
        Some(agent_id) => Column::AgentId.eq(agent_id),
        None => Column::AgentId.is_null(),
    };

    let updated = Entity::update_many()
        .set(ActiveModel {
            status: Set(change.status),
            agent_id: Set(change.agent_id),
            resolved_at: Set(change.resolved_at),
            modified_at: Set(Utc::now().into()),
            ..Default::default()
        })
        .filter(Column::Id.eq(current.id))
        .filter(Column::Status.eq(current.status))
        .filter(agent_matches)
        .exec_with_returning(db)
        .await?;

    match updated.into_iter().next() {
        Some(ticket) => Ok(ticket),
        None => {
            debug!(
                "Support ticket {} changed since it was read as {}",
                current.id, current.status
            );
            Err(Error::not_updated())
        }
    }
}
