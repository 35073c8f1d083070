use domain::{Id, Priority, SenderType};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CreateParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) customer_id: Id,
    #[serde(default)]
    #[schema(value_type = String, example = "normal")]
    pub(crate) priority: Priority,
}

/// Identifies who performs a room transition.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ActorParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) user_id: Id,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct MessageParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) sender_id: Id,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct AiMessageParams {
    #[schema(value_type = String, example = "ai")]
    pub(crate) sender_type: SenderType,
    pub(crate) message: String,
}
