use axum::http::{header, HeaderValue, Method};
use events::EventPublisher;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod params;
pub(crate) mod router;
mod sse;

pub use self::error::{Error, Result};

/// Everything a request handler needs: the database, configuration, the
/// live stream registry and the publisher domain mutators announce through.
#[derive(Clone)]
pub struct AppState {
    service_state: service::AppState,
    pub sse_manager: Arc<::sse::Manager>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(
        service_state: service::AppState,
        sse_manager: Arc<::sse::Manager>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            service_state,
            sse_manager,
            event_publisher,
        }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = app_state.config().clone();
    let server_url = format!("{}:{}", config.interface, config.port);

    info!("Server starting... listening for connections on http://{server_url}");

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed CORS origin {origin}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS, Method::POST, Method::PUT])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::CACHE_CONTROL])
        .allow_origin(allowed_origins);

    let listener = tokio::net::TcpListener::bind(&server_url).await?;

    axum::serve(listener, router::define_routes(app_state).layer(cors_layer)).await
}
