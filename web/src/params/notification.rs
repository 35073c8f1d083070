use domain::{Id, OrderStatus, Role};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct OrderStatusParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) order_id: Id,
    #[schema(value_type = String, format = Uuid)]
    pub(crate) customer_id: Id,
    #[schema(value_type = String, example = "shipped")]
    pub(crate) status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct NoticeParams {
    pub(crate) message: String,
    /// Limits the notice to one role; everyone receives it when absent.
    #[schema(value_type = Option<String>, example = "agent")]
    pub(crate) role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ForceLogoutParams {
    pub(crate) reason: String,
}
