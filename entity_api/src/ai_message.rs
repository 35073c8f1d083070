use super::error::Error;
use chrono::Utc;
use entity::ai_messages::{ActiveModel, Column, Entity, Model};
use entity::{Id, SenderType};
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder};

pub async fn create(
    db: &impl ConnectionTrait,
    room_id: Id,
    sender_type: SenderType,
    message: String,
) -> Result<Model, Error> {
    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        room_id: Set(room_id),
        sender_type: Set(sender_type),
        message: Set(message),
        created_at: Set(Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

pub async fn find_by_room(db: &impl ConnectionTrait, room_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::RoomId.eq(room_id))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}
