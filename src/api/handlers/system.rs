//! System endpoints: health check and viewer tuning.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::RevealSettingsDto;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/reveal` — Reveal tuning for viewers.
#[utoipa::path(
    get,
    path = "/config/reveal",
    tag = "System",
    summary = "Reveal tuning",
    description = "Returns the trigger line, connect threshold and intersection ratio viewer \
                   sessions use.",
    responses(
        (status = 200, description = "Reveal settings", body = RevealSettingsDto),
    )
)]
pub async fn reveal_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(RevealSettingsDto::from(&state.narrative)))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/reveal", get(reveal_config_handler))
}
