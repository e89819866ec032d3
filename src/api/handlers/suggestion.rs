//! Suggestion lookup for the editor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{SuggestionListResponse, SuggestionRequest};
use crate::api::identity::OwnerIdentity;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, KeepsakeError};

/// `POST /api/v1/suggestions` — Ask for track or visual suggestions.
#[utoipa::path(
    post,
    path = "/api/v1/suggestions",
    tag = "Suggestions",
    summary = "Get suggestions",
    description = "Returns at most five suggestions. Empty when no suggestion service is \
                   configured.",
    params(("x-owner-id" = String, Header, description = "Authenticated owner identity")),
    request_body = SuggestionRequest,
    responses(
        (status = 200, description = "Suggestions", body = SuggestionListResponse),
        (status = 400, description = "Blank input", body = ErrorResponse),
        (status = 503, description = "Suggestion service unreachable", body = ErrorResponse),
    )
)]
pub async fn suggest(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Json(req): Json<SuggestionRequest>,
) -> Result<impl IntoResponse, KeepsakeError> {
    tracing::debug!(%owner, kind = ?req.kind, "suggestion lookup");
    let suggestions = state.suggestions.suggest(req.kind, &req.input).await?;
    Ok((StatusCode::OK, Json(SuggestionListResponse { suggestions })))
}

/// Suggestion routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/suggestions", post(suggest))
}
