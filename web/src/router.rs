use crate::{params, sse::handler::sse_handler, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};

use crate::controller::{
    chat_room_controller, health_check_controller, notification_controller,
    support_ticket_controller, user_controller,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Support Desk API"
        ),
        paths(
            chat_room_controller::create,
            chat_room_controller::index,
            chat_room_controller::claim,
            chat_room_controller::post_message,
            chat_room_controller::post_ai_message,
            chat_room_controller::return_to_queue,
            chat_room_controller::conclude,
            chat_room_controller::disconnect,
            chat_room_controller::end,
            chat_room_controller::reactivate,
            chat_room_controller::messages,
            chat_room_controller::ai_messages,
            chat_room_controller::unified_messages,
            health_check_controller::health_check,
            notification_controller::order_status,
            notification_controller::broadcast_notice,
            notification_controller::force_logout,
            support_ticket_controller::create,
            support_ticket_controller::index,
            support_ticket_controller::claim,
            support_ticket_controller::post_message,
            support_ticket_controller::update_status,
            support_ticket_controller::messages,
            user_controller::read,
        ),
        components(
            schemas(
                params::chat_room::CreateParams,
                params::chat_room::ActorParams,
                params::chat_room::MessageParams,
                params::chat_room::AiMessageParams,
                params::support_ticket::CreateParams,
                params::support_ticket::ClaimParams,
                params::support_ticket::UpdateStatusParams,
                params::support_ticket::MessageParams,
                params::notification::OrderStatusParams,
                params::notification::NoticeParams,
                params::notification::ForceLogoutParams,
            )
        ),
        tags(
            (name = "support_desk", description = "Live chat, support tickets and realtime notifications")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(chat_room_routes(app_state.clone()))
        .merge(health_routes())
        .merge(notification_routes(app_state.clone()))
        .merge(sse_routes(app_state.clone()))
        .merge(support_ticket_routes(app_state.clone()))
        .merge(user_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn chat_room_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/room/create", post(chat_room_controller::create))
        .route("/rooms", get(chat_room_controller::index))
        .route("/room/{id}/claim", post(chat_room_controller::claim))
        .route("/room/{id}/message", post(chat_room_controller::post_message))
        .route(
            "/room/{id}/ai-message",
            post(chat_room_controller::post_ai_message),
        )
        .route(
            "/room/{id}/close",
            post(chat_room_controller::return_to_queue),
        )
        .route("/room/{id}/conclude", post(chat_room_controller::conclude))
        .route(
            "/room/{id}/disconnect",
            post(chat_room_controller::disconnect),
        )
        .route("/room/{id}/end", post(chat_room_controller::end))
        .route(
            "/room/{id}/reactivate",
            post(chat_room_controller::reactivate),
        )
        .route("/room/{id}/messages", get(chat_room_controller::messages))
        .route(
            "/room/{id}/ai-messages",
            get(chat_room_controller::ai_messages),
        )
        .route(
            "/room/{id}/unified-messages",
            get(chat_room_controller::unified_messages),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/notifications/orders",
            post(notification_controller::order_status),
        )
        .route("/notices", post(notification_controller::broadcast_notice))
        .route(
            "/users/{id}/force-logout",
            post(notification_controller::force_logout),
        )
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sse/{user_id}", get(sse_handler))
        .with_state(app_state)
}

fn support_ticket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/tickets/create", post(support_ticket_controller::create))
        .route("/tickets", get(support_ticket_controller::index))
        .route("/tickets/{id}/claim", put(support_ticket_controller::claim))
        .route(
            "/tickets/{id}/message",
            post(support_ticket_controller::post_message),
        )
        .route(
            "/tickets/{id}/status",
            put(support_ticket_controller::update_status),
        )
        .route(
            "/tickets/{id}/messages",
            get(support_ticket_controller::messages),
        )
        .with_state(app_state)
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users/{id}", get(user_controller::read))
        .with_state(app_state)
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod router_tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use clap::Parser;
    use domain::{Id, Role};
    use events::EventPublisher;
    use futures::StreamExt;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use service::config::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(db: MockDatabase) -> Router {
        app_with_manager(db, Arc::new(::sse::Manager::new()))
    }

    fn app_with_manager(db: MockDatabase, sse_manager: Arc<::sse::Manager>) -> Router {
        let db = Arc::new(db.into_connection());
        let config = Config::try_parse_from(["support_desk_rs"]).unwrap();
        let service_state = service::AppState::new(config, &db);
        let app_state = AppState::new(service_state, sse_manager, EventPublisher::new());
        define_routes(app_state)
    }

    fn user(id: Id, role: Role) -> domain::users::Model {
        let now = Utc::now();
        domain::users::Model {
            id,
            email: "carol@example.com".to_string(),
            display_name: Some("Carol".to_string()),
            role,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_responds_healthy() {
        let app = app_with(MockDatabase::new(DatabaseBackend::Postgres));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_user_profile_is_a_404_with_error_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<domain::users::Model>::new()]);
        let app = app_with(db);

        let request = Request::builder()
            .uri(format!("/users/{}", Id::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn user_profile_is_wrapped_in_api_response() {
        let id = Id::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![user(id, Role::Customer)]]);
        let app = app_with(db);

        let request = Request::builder()
            .uri(format!("/users/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["data"]["id"], id.to_string());
    }

    #[tokio::test]
    async fn empty_notice_is_a_400_with_message() {
        let app = app_with(MockDatabase::new(DatabaseBackend::Postgres));

        let request = Request::builder()
            .method("POST")
            .uri("/notices")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"  "}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("notice"));
    }

    #[tokio::test]
    async fn staff_cannot_open_a_chat_room() {
        let agent_id = Id::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![user(agent_id, Role::Agent)]]);
        let app = app_with(db);

        let request = Request::builder()
            .method("POST")
            .uri("/room/create")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"customer_id":"{agent_id}"}}"#)))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn closing_the_push_stream_unregisters_the_connection() {
        let agent_id = Id::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![user(agent_id, Role::Agent)]]);
        let sse_manager = Arc::new(::sse::Manager::new());
        let app = app_with_manager(db, sse_manager.clone());

        let request = Request::builder()
            .uri(format!("/api/sse/{agent_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&first).contains("connected"));
        assert!(sse_manager.is_connected(&agent_id));

        drop(body);
        tokio::task::yield_now().await;

        assert!(!sse_manager.is_connected(&agent_id));
    }
}
