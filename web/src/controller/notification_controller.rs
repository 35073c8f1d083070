use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::notification::{ForceLogoutParams, NoticeParams, OrderStatusParams};
use crate::{AppState, Error};
use domain::{notification as NotificationApi, system as SystemApi, Id};
use log::*;

/// POST hook called by the order service when an order changes status
#[utoipa::path(
    post,
    path = "/notifications/orders",
    request_body = OrderStatusParams,
    responses(
        (status = 202, description = "Notification pushed to the customer if connected"),
        (status = 404, description = "Customer not found"),
    )
)]
pub async fn order_status(
    State(app_state): State<AppState>,
    Json(params): Json<OrderStatusParams>,
) -> Result<impl IntoResponse, Error> {
    debug!(
        "POST order {} status {:?} for customer {}",
        params.order_id, params.status, params.customer_id
    );

    NotificationApi::publish_order_status(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        params.order_id,
        params.customer_id,
        params.status,
    )
    .await?;

    Ok(Json(ApiResponse::<()>::no_content(
        StatusCode::ACCEPTED.into(),
    )))
}

/// POST a system notice to everyone or to one role
#[utoipa::path(
    post,
    path = "/notices",
    request_body = NoticeParams,
    responses(
        (status = 202, description = "Notice pushed to connected users"),
        (status = 400, description = "Empty notice"),
    )
)]
pub async fn broadcast_notice(
    State(app_state): State<AppState>,
    Json(params): Json<NoticeParams>,
) -> Result<impl IntoResponse, Error> {
    SystemApi::broadcast_notice(&app_state.event_publisher, params.message, params.role).await?;

    Ok(Json(ApiResponse::<()>::no_content(
        StatusCode::ACCEPTED.into(),
    )))
}

/// POST end a user's live session
#[utoipa::path(
    post,
    path = "/users/{id}/force-logout",
    params(("id" = String, Path, description = "User whose session is revoked")),
    request_body = ForceLogoutParams,
    responses(
        (status = 202, description = "Logout pushed to the user if connected"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn force_logout(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<ForceLogoutParams>,
) -> Result<impl IntoResponse, Error> {
    SystemApi::force_logout(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        params.reason,
    )
    .await?;

    Ok(Json(ApiResponse::<()>::no_content(
        StatusCode::ACCEPTED.into(),
    )))
}
