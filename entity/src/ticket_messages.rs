use crate::{utc, Id, SenderType};
use events::schema::TicketMessageView;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "support_desk", table_name = "ticket_messages")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    pub ticket_id: Id,
    pub sender_type: SenderType,
    pub sender_id: Option<Id>,
    pub message: String,
    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::support_tickets::Entity",
        from = "Column::TicketId",
        to = "super::support_tickets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SupportTickets,
}

impl Related<super::support_tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupportTickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TicketMessageView {
    fn from(model: Model) -> Self {
        TicketMessageView {
            id: model.id,
            ticket_id: model.ticket_id,
            sender_type: model.sender_type,
            sender_id: model.sender_id,
            message: model.message,
            created_at: utc(model.created_at),
        }
    }
}
