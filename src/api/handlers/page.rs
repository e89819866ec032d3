//! Owner dashboard endpoints: create, list, open, edit and delete pages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    AcceptedResponse, CreatePageRequest, CreatePageResponse, DashboardResponse, FieldPatchRequest,
    PageDto, PageListResponse,
};
use crate::api::identity::OwnerIdentity;
use crate::app_state::AppState;
use crate::domain::{PageId, PagePatch};
use crate::error::{ErrorResponse, KeepsakeError};

/// `POST /api/v1/pages` — Create a new page.
#[utoipa::path(
    post,
    path = "/api/v1/pages",
    tag = "Pages",
    summary = "Create a page",
    description = "Creates a page owned by the caller with a fresh access code. The page is \
                   written asynchronously; the response carries the public URL immediately.",
    params(("x-owner-id" = String, Header, description = "Authenticated owner identity")),
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Page created", body = CreatePageResponse),
        (status = 403, description = "Missing identity", body = ErrorResponse),
        (status = 503, description = "Store unreachable", body = ErrorResponse),
    )
)]
pub async fn create_page(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Json(req): Json<CreatePageRequest>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let created = state.page_service.create_page(&owner, req.into()).await?;
    Ok((StatusCode::CREATED, Json(CreatePageResponse::from(created))))
}

/// `GET /api/v1/pages` — List the caller's pages.
#[utoipa::path(
    get,
    path = "/api/v1/pages",
    tag = "Pages",
    summary = "List my pages",
    description = "Returns the caller's pages, newest first, including unconfirmed creations.",
    params(("x-owner-id" = String, Header, description = "Authenticated owner identity")),
    responses(
        (status = 200, description = "Owned pages", body = PageListResponse),
        (status = 403, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn list_pages(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
) -> Result<impl IntoResponse, KeepsakeError> {
    let pages: Vec<PageDto> = state
        .page_service
        .list_pages(&owner)
        .await?
        .iter()
        .map(PageDto::from)
        .collect();
    let total = pages.len();
    Ok((StatusCode::OK, Json(PageListResponse { pages, total })))
}

/// `GET /api/v1/pages/{id}` — Open a page in the editor.
#[utoipa::path(
    get,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    summary = "Open a page",
    description = "Returns the page with its ordered events as the caller currently sees them.",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    responses(
        (status = 200, description = "Dashboard view", body = DashboardResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse),
    )
)]
pub async fn get_page(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let dashboard = state
        .page_service
        .dashboard(&owner, PageId::from_uuid(id))
        .await?;
    Ok((StatusCode::OK, Json(DashboardResponse::from(dashboard))))
}

/// `PATCH /api/v1/pages/{id}` — Write one page field.
#[utoipa::path(
    patch,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    summary = "Update a page field",
    description = "Enqueues a single-field write. Failures are reported on the WebSocket \
                   `write_failed` event, not in this response.",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    request_body = FieldPatchRequest,
    responses(
        (status = 202, description = "Write accepted", body = AcceptedResponse),
        (status = 400, description = "Unknown field or bad value", body = ErrorResponse),
    )
)]
pub async fn update_page(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<FieldPatchRequest>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let patch: PagePatch = req.into_patch().map_err(KeepsakeError::InvalidRequest)?;
    let ticket = state
        .page_service
        .update_page(&owner, PageId::from_uuid(id), patch)
        .await;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::from(ticket))))
}

/// `DELETE /api/v1/pages/{id}` — Delete a page and its events.
#[utoipa::path(
    delete,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    summary = "Delete a page",
    description = "Enqueues deletion of the page and every event under it.",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    responses(
        (status = 202, description = "Deletion accepted", body = AcceptedResponse),
        (status = 403, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn delete_page(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let ticket = state
        .page_service
        .delete_page(&owner, PageId::from_uuid(id))
        .await;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::from(ticket))))
}

/// Page routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pages", post(create_page).get(list_pages))
        .route(
            "/pages/{id}",
            get(get_page).patch(update_page).delete(delete_page),
        )
}
