use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use domain::{user as UserApi, Id};
use futures::Stream;
use log::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Unregisters its connection when dropped. The stream owns it, so the
/// entry goes away whether the channel closed or the client hung up.
struct ConnectionGuard {
    manager: Arc<::sse::Manager>,
    user_id: Id,
    connection_id: ::sse::connection::ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("SSE connection closed for user {}, cleaning up", self.user_id);
        self.manager
            .unregister_connection(&self.user_id, &self.connection_id);
    }
}

/// SSE handler that establishes a long-lived connection for real-time updates.
/// One connection per user; a newer stream for the same user replaces this one.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Path(user_id): Path<Id>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let role = UserApi::find_role(app_state.db_conn_ref(), user_id).await?;
    debug!("Establishing SSE connection for {role} {user_id}");

    let (tx, mut rx) = mpsc::unbounded_channel();

    // The handshake goes first so it precedes anything routed after registration.
    let _ = tx.send(Ok(::sse::message::handshake_event()));

    let connection_id = app_state
        .sse_manager
        .register_connection(user_id, role, tx);

    let guard = ConnectionGuard {
        manager: app_state.sse_manager.clone(),
        user_id,
        connection_id,
    };

    // Events arrive from the channel already encoded
    let stream = stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(app_state.config().sse_keep_alive_secs))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keep_alive))
}
