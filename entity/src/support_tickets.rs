//! SeaORM Entity for support_tickets table.

use crate::{utc, Id, Priority, TicketStatus};
use events::schema::TicketView;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "support_desk", table_name = "support_tickets")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub customer_id: Id,

    /// Set once an agent claims the ticket
    pub agent_id: Option<Id>,

    pub status: TicketStatus,

    pub subject: String,

    pub priority: Priority,

    /// Free-form topic chosen by the customer (billing, shipping, ...)
    pub category: String,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub modified_at: DateTimeWithTimeZone,

    pub resolved_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CustomerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Customers,

    #[sea_orm(has_many = "super::ticket_messages::Entity")]
    TicketMessages,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::ticket_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TicketView {
    fn from(model: Model) -> Self {
        TicketView {
            id: model.id,
            customer_id: model.customer_id,
            agent_id: model.agent_id,
            status: model.status,
            subject: model.subject,
            priority: model.priority,
            category: model.category,
            created_at: utc(model.created_at),
            modified_at: utc(model.modified_at),
            resolved_at: model.resolved_at.map(utc),
        }
    }
}
