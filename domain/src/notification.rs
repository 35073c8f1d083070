use crate::error::Error;
use crate::{DomainEvent, EventPublisher, Id, OrderStatus};
use entity_api::user;
use log::*;
use sea_orm::DatabaseConnection;

/// Tells a customer that one of their orders changed status. Only customers
/// that exist receive notifications; nothing is stored.
pub async fn publish_order_status(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    order_id: Id,
    customer_id: Id,
    status: OrderStatus,
) -> Result<(), Error> {
    let customer = user::find_by_id(db, customer_id).await?;

    debug!("Order {order_id} of customer {} is now {status:?}", customer.id);

    event_publisher
        .publish(DomainEvent::OrderStatusChanged {
            order_id,
            customer_id: customer.id,
            status,
        })
        .await;

    Ok(())
}
