use domain::support_ticket::NewTicket;
use domain::{Id, Priority, TicketStatus};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CreateParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) customer_id: Id,
    pub(crate) subject: String,
    #[serde(default = "default_category")]
    pub(crate) category: String,
    #[serde(default)]
    #[schema(value_type = String, example = "normal")]
    pub(crate) priority: Priority,
    /// Body of the ticket's first message.
    pub(crate) message: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl CreateParams {
    pub(crate) fn into_parts(self) -> (Id, NewTicket) {
        (
            self.customer_id,
            NewTicket {
                subject: self.subject,
                category: self.category,
                priority: self.priority,
                message: self.message,
            },
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ClaimParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) agent_id: Id,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct UpdateStatusParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) agent_id: Id,
    #[schema(value_type = String, example = "resolved")]
    pub(crate) status: TicketStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct MessageParams {
    #[schema(value_type = String, format = Uuid)]
    pub(crate) sender_id: Id,
    pub(crate) message: String,
}
