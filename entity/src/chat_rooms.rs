//! SeaORM Entity for chat_rooms table.
//! One live-chat session between a customer and at most one agent.

use crate::{utc, Id, Priority, RoomStatus};
use events::schema::RoomView;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "support_desk", table_name = "chat_rooms")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub customer_id: Id,

    /// Only set while the room is active
    pub agent_id: Option<Id>,

    pub status: RoomStatus,

    pub priority: Priority,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub modified_at: DateTimeWithTimeZone,

    /// When the customer last ended or left the chat
    pub closed_at: Option<DateTimeWithTimeZone>,
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

    #[sea_orm(has_many = "super::chat_messages::Entity")]
    ChatMessages,

    #[sea_orm(has_many = "super::ai_messages::Entity")]
    AiMessages,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::chat_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatMessages.def()
    }
}

impl Related<super::ai_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AiMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RoomView {
    fn from(model: Model) -> Self {
        RoomView {
            id: model.id,
            customer_id: model.customer_id,
            agent_id: model.agent_id,
            status: model.status,
            priority: model.priority,
            created_at: utc(model.created_at),
            modified_at: utc(model.modified_at),
            closed_at: model.closed_at.map(utc),
        }
    }
}
