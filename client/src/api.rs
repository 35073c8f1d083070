use anyhow::{Context, Result};
use async_trait::async_trait;
use events::schema::{
    ChatMessageView, CustomerProfile, Priority, RoomView, TicketMessageView, TicketStatus,
    TicketView,
};
use events::Id;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// A request the server answered with an error status and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTicketRequest {
    pub subject: String,
    pub category: String,
    pub priority: Priority,
    pub message: String,
}

/// REST calls made by the client store.
#[async_trait]
pub trait SupportApi: Send + Sync {
    async fn rooms(&self, user_id: Id) -> Result<Vec<RoomView>>;
    async fn tickets(&self, user_id: Id) -> Result<Vec<TicketView>>;
    async fn unified_messages(&self, room_id: Id, user_id: Id) -> Result<Vec<ChatMessageView>>;
    async fn ticket_messages(&self, ticket_id: Id, user_id: Id)
        -> Result<Vec<TicketMessageView>>;
    async fn profile(&self, user_id: Id) -> Result<CustomerProfile>;

    async fn claim_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView>;
    async fn return_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView>;
    async fn conclude_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView>;
    async fn send_room_message(
        &self,
        room_id: Id,
        sender_id: Id,
        message: &str,
    ) -> Result<ChatMessageView>;

    async fn create_ticket(&self, customer_id: Id, ticket: &NewTicketRequest)
        -> Result<TicketView>;
    async fn claim_ticket(&self, ticket_id: Id, agent_id: Id) -> Result<TicketView>;
    async fn update_ticket_status(
        &self,
        ticket_id: Id,
        agent_id: Id,
        status: TicketStatus,
    ) -> Result<TicketView>;
    async fn send_ticket_message(
        &self,
        ticket_id: Id,
        sender_id: Id,
        message: &str,
    ) -> Result<TicketMessageView>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

pub struct HttpSupportApi {
    client: Client,
    base_url: String,
}

impl HttpSupportApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends the request and unwraps the `data` field of the response body.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Failed to {what}: {status}"));
            return Err(ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response to {what}"))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl SupportApi for HttpSupportApi {
    async fn rooms(&self, user_id: Id) -> Result<Vec<RoomView>> {
        let request = self
            .client
            .get(self.url("/rooms"))
            .query(&[("user_id", user_id)]);
        self.call(request, "fetch rooms").await
    }

    async fn tickets(&self, user_id: Id) -> Result<Vec<TicketView>> {
        let request = self
            .client
            .get(self.url("/tickets"))
            .query(&[("user_id", user_id)]);
        self.call(request, "fetch tickets").await
    }

    async fn unified_messages(&self, room_id: Id, user_id: Id) -> Result<Vec<ChatMessageView>> {
        let request = self
            .client
            .get(self.url(&format!("/room/{room_id}/unified-messages")))
            .query(&[("user_id", user_id)]);
        self.call(request, "fetch room messages").await
    }

    async fn ticket_messages(
        &self,
        ticket_id: Id,
        user_id: Id,
    ) -> Result<Vec<TicketMessageView>> {
        let request = self
            .client
            .get(self.url(&format!("/tickets/{ticket_id}/messages")))
            .query(&[("user_id", user_id)]);
        self.call(request, "fetch ticket messages").await
    }

    async fn profile(&self, user_id: Id) -> Result<CustomerProfile> {
        let request = self.client.get(self.url(&format!("/users/{user_id}")));
        self.call(request, "fetch user profile").await
    }

    async fn claim_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView> {
        let request = self
            .client
            .post(self.url(&format!("/room/{room_id}/claim")))
            .json(&json!({ "user_id": agent_id }));
        self.call(request, "claim room").await
    }

    async fn return_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView> {
        let request = self
            .client
            .post(self.url(&format!("/room/{room_id}/close")))
            .json(&json!({ "user_id": agent_id }));
        self.call(request, "return room to queue").await
    }

    async fn conclude_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView> {
        let request = self
            .client
            .post(self.url(&format!("/room/{room_id}/conclude")))
            .json(&json!({ "user_id": agent_id }));
        self.call(request, "conclude room").await
    }

    async fn send_room_message(
        &self,
        room_id: Id,
        sender_id: Id,
        message: &str,
    ) -> Result<ChatMessageView> {
        let request = self
            .client
            .post(self.url(&format!("/room/{room_id}/message")))
            .json(&json!({ "sender_id": sender_id, "message": message }));
        self.call(request, "send room message").await
    }

    async fn create_ticket(
        &self,
        customer_id: Id,
        ticket: &NewTicketRequest,
    ) -> Result<TicketView> {
        let request = self.client.post(self.url("/tickets/create")).json(&json!({
            "customer_id": customer_id,
            "subject": ticket.subject,
            "category": ticket.category,
            "priority": ticket.priority,
            "message": ticket.message,
        }));
        self.call(request, "create ticket").await
    }

    async fn claim_ticket(&self, ticket_id: Id, agent_id: Id) -> Result<TicketView> {
        let request = self
            .client
            .put(self.url(&format!("/tickets/{ticket_id}/claim")))
            .json(&json!({ "agent_id": agent_id }));
        self.call(request, "claim ticket").await
    }

    async fn update_ticket_status(
        &self,
        ticket_id: Id,
        agent_id: Id,
        status: TicketStatus,
    ) -> Result<TicketView> {
        let request = self
            .client
            .put(self.url(&format!("/tickets/{ticket_id}/status")))
            .json(&json!({ "agent_id": agent_id, "status": status }));
        self.call(request, "update ticket status").await
    }

    async fn send_ticket_message(
        &self,
        ticket_id: Id,
        sender_id: Id,
        message: &str,
    ) -> Result<TicketMessageView> {
        let request = self
            .client
            .post(self.url(&format!("/tickets/{ticket_id}/message")))
            .json(&json!({ "sender_id": sender_id, "message": message }));
        self.call(request, "send ticket message").await
    }
}
