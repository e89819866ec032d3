//! Timeline event endpoints under a page.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{patch, post};
use axum::{Json, Router};

use crate::api::dto::{AcceptedResponse, CreateEventResponse, FieldPatchRequest};
use crate::api::identity::OwnerIdentity;
use crate::app_state::AppState;
use crate::domain::{EventId, EventPatch, PageId};
use crate::error::{ErrorResponse, KeepsakeError};

/// `POST /api/v1/pages/{id}/events` — Add a placeholder memory.
#[utoipa::path(
    post,
    path = "/api/v1/pages/{id}/events",
    tag = "Events",
    summary = "Add an event",
    description = "Enqueues a \"New Memory\" placeholder dated today, ordered after the \
                   existing events.",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    responses(
        (status = 202, description = "Event accepted", body = CreateEventResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse),
    )
)]
pub async fn add_event(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let (event_id, ticket) = state
        .page_service
        .add_event(&owner, PageId::from_uuid(id))
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateEventResponse {
            event_id: *event_id.as_uuid(),
            page_id: id,
            seq: ticket.seq,
        }),
    ))
}

/// `PATCH /api/v1/pages/{id}/events/{event_id}` — Write one event field.
#[utoipa::path(
    patch,
    path = "/api/v1/pages/{id}/events/{event_id}",
    tag = "Events",
    summary = "Update an event field",
    description = "Enqueues a single-field write on one event.",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("event_id" = uuid::Uuid, Path, description = "Event ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    request_body = FieldPatchRequest,
    responses(
        (status = 202, description = "Write accepted", body = AcceptedResponse),
        (status = 400, description = "Unknown field or bad value", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path((id, event_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    Json(req): Json<FieldPatchRequest>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let patch: EventPatch = req.into_patch().map_err(KeepsakeError::InvalidRequest)?;
    let ticket = state
        .page_service
        .update_event(
            &owner,
            PageId::from_uuid(id),
            EventId::from_uuid(event_id),
            patch,
        )
        .await;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::from(ticket))))
}

/// `DELETE /api/v1/pages/{id}/events/{event_id}` — Remove one event.
#[utoipa::path(
    delete,
    path = "/api/v1/pages/{id}/events/{event_id}",
    tag = "Events",
    summary = "Delete an event",
    params(
        ("id" = uuid::Uuid, Path, description = "Page ID"),
        ("event_id" = uuid::Uuid, Path, description = "Event ID"),
        ("x-owner-id" = String, Header, description = "Authenticated owner identity"),
    ),
    responses(
        (status = 202, description = "Deletion accepted", body = AcceptedResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path((id, event_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, KeepsakeError> {
    let ticket = state
        .page_service
        .delete_event(&owner, PageId::from_uuid(id), EventId::from_uuid(event_id))
        .await;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::from(ticket))))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pages/{id}/events", post(add_event))
        .route(
            "/pages/{id}/events/{event_id}",
            patch(update_event).delete(delete_event),
        )
}
