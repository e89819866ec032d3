//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::api::identity::OwnerIdentity;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The owner header is optional here: anonymous connections may still
/// follow a page by access code.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let owner = OwnerIdentity::from_headers(&headers).map(|identity| identity.0);
    tracing::debug!(owner = owner.as_ref().map(|o| o.as_str()), "ws upgrade");

    ws.on_upgrade(move |socket| run_connection(socket, state, owner))
}
