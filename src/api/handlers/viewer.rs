//! Public viewer endpoints. No identity required; the access code is the
//! only credential.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::PublicViewResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, KeepsakeError};

/// `GET /view/{code}` — Open a page by access code.
#[utoipa::path(
    get,
    path = "/view/{code}",
    tag = "Viewer",
    summary = "View by code",
    description = "Resolves the access code and returns the page, its ordered events and \
                   the render plan for its layout.",
    params(("code" = String, Path, description = "Ten-character access code")),
    responses(
        (status = 200, description = "Public view", body = PublicViewResponse),
        (status = 404, description = "No page for this code", body = ErrorResponse),
        (status = 503, description = "Store unreachable, retry", body = ErrorResponse),
    )
)]
pub async fn view_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let view = state.page_service.view_by_code(&code).await?;
    Ok((
        StatusCode::OK,
        Json(PublicViewResponse::new(&view, &state.narrative)),
    ))
}

/// `GET /surprise/{slug}/{code}` — Open a shared link.
#[utoipa::path(
    get,
    path = "/surprise/{slug}/{code}",
    tag = "Viewer",
    summary = "View by shared link",
    description = "Same as the code route. The slug is cosmetic and never checked.",
    params(
        ("slug" = String, Path, description = "Recipient slug"),
        ("code" = String, Path, description = "Ten-character access code"),
    ),
    responses(
        (status = 200, description = "Public view", body = PublicViewResponse),
        (status = 404, description = "No page for this code", body = ErrorResponse),
        (status = 503, description = "Store unreachable, retry", body = ErrorResponse),
    )
)]
pub async fn view_by_link(
    State(state): State<AppState>,
    Path((slug, code)): Path<(String, String)>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let view = state.page_service.view_by_link(&slug, &code).await?;
    Ok((
        StatusCode::OK,
        Json(PublicViewResponse::new(&view, &state.narrative)),
    ))
}

/// Viewer routes, mounted at the root so shared links stay short.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/view/{code}", get(view_by_code))
        .route("/surprise/{slug}/{code}", get(view_by_link))
}
