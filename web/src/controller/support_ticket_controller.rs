use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::support_ticket::{ClaimParams, CreateParams, MessageParams, UpdateStatusParams};
use crate::params::ViewerParams;
use crate::{AppState, Error};
use domain::{support_ticket as SupportTicketApi, Id};
use log::*;

/// POST open a support ticket with its first message
#[utoipa::path(
    post,
    path = "/tickets/create",
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully created a new ticket"),
        (status = 400, description = "Empty subject or message, or the customer has too many open tickets"),
        (status = 404, description = "Customer not found"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    let (customer_id, new_ticket) = params.into_parts();
    debug!("POST Create ticket for customer {customer_id}: {}", new_ticket.subject);

    let ticket = SupportTicketApi::create(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        app_state.config().max_open_tickets,
        customer_id,
        new_ticket,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), ticket)))
}

/// GET all tickets visible to a user
#[utoipa::path(
    get,
    path = "/tickets",
    params(ViewerParams),
    responses(
        (status = 200, description = "Tickets owned by the customer, or every ticket for staff"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET tickets for user {}", params.user_id);

    let tickets =
        SupportTicketApi::find_for_user(app_state.db_conn_ref(), params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), tickets)))
}

/// PUT claim an unassigned ticket
#[utoipa::path(
    put,
    path = "/tickets/{id}/claim",
    params(("id" = String, Path, description = "Ticket id to claim")),
    request_body = ClaimParams,
    responses(
        (status = 200, description = "The ticket is assigned to the agent and in progress"),
        (status = 400, description = "The ticket cannot be claimed from its current status"),
        (status = 409, description = "Another agent claimed the ticket first"),
    )
)]
pub async fn claim(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ClaimParams>,
) -> Result<impl IntoResponse, Error> {
    info!("PUT agent {} claims ticket {id}", params.agent_id);

    let ticket = SupportTicketApi::claim(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.agent_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), ticket)))
}

/// POST a message to a ticket thread
#[utoipa::path(
    post,
    path = "/tickets/{id}/message",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = MessageParams,
    responses(
        (status = 201, description = "Message stored and delivered"),
        (status = 400, description = "Sender may not write to this ticket"),
        (status = 404, description = "Ticket or sender not found"),
    )
)]
pub async fn post_message(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<MessageParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST message to ticket {id} from {}", params.sender_id);

    let message = SupportTicketApi::post_message(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.sender_id,
        params.message,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), message)))
}

/// PUT move a ticket to a new status
#[utoipa::path(
    put,
    path = "/tickets/{id}/status",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = UpdateStatusParams,
    responses(
        (status = 200, description = "Ticket status updated"),
        (status = 400, description = "Not the assigned agent, or the transition is not allowed"),
        (status = 409, description = "The ticket changed concurrently"),
    )
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<UpdateStatusParams>,
) -> Result<impl IntoResponse, Error> {
    info!(
        "PUT agent {} moves ticket {id} to {}",
        params.agent_id, params.status
    );

    let ticket = SupportTicketApi::update_status(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.agent_id,
        params.status,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), ticket)))
}

/// GET the messages of a ticket thread
#[utoipa::path(
    get,
    path = "/tickets/{id}/messages",
    params(("id" = String, Path, description = "Ticket id"), ViewerParams),
    responses(
        (status = 200, description = "Ticket messages in creation order"),
        (status = 400, description = "Ticket belongs to another customer"),
        (status = 404, description = "Ticket or user not found"),
    )
)]
pub async fn messages(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET messages of ticket {id}");

    let messages = SupportTicketApi::messages(app_state.db_conn_ref(), id, params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}
