pub(crate) mod chat_room;
pub(crate) mod notification;
pub(crate) mod support_ticket;

use domain::Id;
use serde::Deserialize;
use utoipa::IntoParams;

/// The acting user on read endpoints. Authentication happens upstream of
/// this service, so the caller names who it is asking for.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ViewerParams {
    #[param(value_type = String, format = Uuid)]
    pub(crate) user_id: Id,
}
