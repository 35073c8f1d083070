//! SeaORM Entity for chat_messages table.
//! The live transcript of a room: messages typed by customers and agents.

use crate::{utc, Id, SenderType};
use events::schema::{ChatMessageView, MessageSource};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "support_desk", table_name = "chat_messages")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    pub room_id: Id,
    pub sender_type: SenderType,
    pub sender_id: Option<Id>,
    pub message: String,
    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_rooms::Entity",
        from = "Column::RoomId",
        to = "super::chat_rooms::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ChatRooms,
}

impl Related<super::chat_rooms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatRooms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ChatMessageView {
    fn from(model: Model) -> Self {
        ChatMessageView {
            id: model.id,
            room_id: model.room_id,
            sender_type: model.sender_type,
            sender_id: model.sender_id,
            message: model.message,
            created_at: utc(model.created_at),
            source: MessageSource::Live,
        }
    }
}
