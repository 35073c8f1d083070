use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::chat_room::{ActorParams, AiMessageParams, CreateParams, MessageParams};
use crate::params::ViewerParams;
use crate::{AppState, Error};
use domain::{chat_room as ChatRoomApi, Id};
use log::*;

/// POST open a chat room for a customer, or return the one they already have
#[utoipa::path(
    post,
    path = "/room/create",
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully opened (or resumed) a chat room"),
        (status = 400, description = "Only customers may open chats"),
        (status = 404, description = "Customer not found"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Open chat room for customer {}", params.customer_id);

    let room = ChatRoomApi::open(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        params.customer_id,
        params.priority,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), room)))
}

/// GET all chat rooms visible to a user
#[utoipa::path(
    get,
    path = "/rooms",
    params(ViewerParams),
    responses(
        (status = 200, description = "Rooms owned by the customer, or every room for staff"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET rooms for user {}", params.user_id);

    let rooms = ChatRoomApi::find_for_user(app_state.db_conn_ref(), params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), rooms)))
}

/// POST claim a waiting chat room
#[utoipa::path(
    post,
    path = "/room/{id}/claim",
    params(("id" = String, Path, description = "Chat room id to claim")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "The room is now assigned to the agent"),
        (status = 400, description = "The room cannot be claimed from its current status"),
        (status = 409, description = "Another agent claimed the room first"),
    )
)]
pub async fn claim(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST agent {} claims room {id}", params.user_id);

    let room = ChatRoomApi::claim(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// POST a live chat message to a room
#[utoipa::path(
    post,
    path = "/room/{id}/message",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = MessageParams,
    responses(
        (status = 201, description = "Message stored and delivered"),
        (status = 400, description = "Sender may not write to this room"),
        (status = 404, description = "Room or sender not found"),
    )
)]
pub async fn post_message(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<MessageParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST message to room {id} from {}", params.sender_id);

    let message = ChatRoomApi::post_message(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.sender_id,
        params.message,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), message)))
}

/// POST one turn of the AI assistant transcript
#[utoipa::path(
    post,
    path = "/room/{id}/ai-message",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = AiMessageParams,
    responses(
        (status = 201, description = "Transcript entry stored"),
        (status = 400, description = "Invalid sender type or concluded room"),
        (status = 404, description = "Room not found"),
    )
)]
pub async fn post_ai_message(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<AiMessageParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST AI transcript entry to room {id}");

    let message = ChatRoomApi::post_ai_message(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.sender_type,
        params.message,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), message)))
}

/// POST the assigned agent returns the room to the waiting queue
#[utoipa::path(
    post,
    path = "/room/{id}/close",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "Room is waiting again"),
        (status = 400, description = "Not the assigned agent, or invalid transition"),
        (status = 409, description = "The room changed concurrently"),
    )
)]
pub async fn return_to_queue(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST agent {} returns room {id} to the queue", params.user_id);

    let room = ChatRoomApi::return_to_queue(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// POST the assigned agent concludes the chat
#[utoipa::path(
    post,
    path = "/room/{id}/conclude",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "Room concluded"),
        (status = 400, description = "Not the assigned agent, or invalid transition"),
        (status = 409, description = "The room changed concurrently"),
    )
)]
pub async fn conclude(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST agent {} concludes room {id}", params.user_id);

    let room = ChatRoomApi::conclude(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// POST the customer's client went away
#[utoipa::path(
    post,
    path = "/room/{id}/disconnect",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "Room returned to waiting"),
        (status = 400, description = "Not the room's customer, or invalid transition"),
        (status = 409, description = "The room changed concurrently"),
    )
)]
pub async fn disconnect(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST customer {} disconnected from room {id}", params.user_id);

    let room = ChatRoomApi::customer_disconnect(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// POST the customer ends the chat
#[utoipa::path(
    post,
    path = "/room/{id}/end",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "Room concluded by the customer"),
        (status = 400, description = "Not the room's customer, or invalid transition"),
        (status = 409, description = "The room changed concurrently"),
    )
)]
pub async fn end(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST customer {} ends room {id}", params.user_id);

    let room = ChatRoomApi::customer_close(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// POST the customer re-engages with a waiting or concluded room
#[utoipa::path(
    post,
    path = "/room/{id}/reactivate",
    params(("id" = String, Path, description = "Chat room id")),
    request_body = ActorParams,
    responses(
        (status = 200, description = "Room is waiting for an agent"),
        (status = 400, description = "Not the room's customer, or invalid transition"),
        (status = 409, description = "The room changed concurrently"),
    )
)]
pub async fn reactivate(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ActorParams>,
) -> Result<impl IntoResponse, Error> {
    info!("POST customer {} reactivates room {id}", params.user_id);

    let room = ChatRoomApi::reactivate(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.user_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), room)))
}

/// GET the live transcript of a room
#[utoipa::path(
    get,
    path = "/room/{id}/messages",
    params(("id" = String, Path, description = "Chat room id"), ViewerParams),
    responses(
        (status = 200, description = "Live messages in creation order"),
        (status = 400, description = "Room belongs to another customer"),
        (status = 404, description = "Room or user not found"),
    )
)]
pub async fn messages(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET live messages of room {id}");

    let messages = ChatRoomApi::live_messages(app_state.db_conn_ref(), id, params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}

/// GET the AI assistant transcript of a room
#[utoipa::path(
    get,
    path = "/room/{id}/ai-messages",
    params(("id" = String, Path, description = "Chat room id"), ViewerParams),
    responses(
        (status = 200, description = "AI transcript in creation order"),
        (status = 400, description = "Room belongs to another customer"),
        (status = 404, description = "Room or user not found"),
    )
)]
pub async fn ai_messages(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET AI messages of room {id}");

    let messages = ChatRoomApi::ai_messages(app_state.db_conn_ref(), id, params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}

/// GET both transcripts of a room merged into one timeline
#[utoipa::path(
    get,
    path = "/room/{id}/unified-messages",
    params(("id" = String, Path, description = "Chat room id"), ViewerParams),
    responses(
        (status = 200, description = "AI and live messages ordered by creation time"),
        (status = 400, description = "Room belongs to another customer"),
        (status = 404, description = "Room or user not found"),
    )
)]
pub async fn unified_messages(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<ViewerParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET unified timeline of room {id}");

    let messages =
        ChatRoomApi::unified_messages(app_state.db_conn_ref(), id, params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}
