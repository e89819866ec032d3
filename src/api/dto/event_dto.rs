//! Timeline event DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::TimelineEvent;

/// Event representation shared by the dashboard and the public view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDto {
    /// Event identifier.
    pub id: uuid::Uuid,
    /// Owning page.
    pub page_id: uuid::Uuid,
    /// Headline.
    pub title: String,
    /// Story text.
    pub story: String,
    /// Image reference.
    pub image: Option<String>,
    /// Date as entered, usually `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Order hint.
    pub order: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&TimelineEvent> for EventDto {
    fn from(event: &TimelineEvent) -> Self {
        Self {
            id: *event.id.as_uuid(),
            page_id: *event.page_id.as_uuid(),
            title: event.title.clone(),
            story: event.story.clone(),
            image: event.image.clone(),
            date: event.date.clone(),
            order: event.order,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// Response body for `POST /pages/{id}/events` (202 Accepted).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateEventResponse {
    /// Identifier of the placeholder event.
    pub event_id: uuid::Uuid,
    /// Owning page.
    pub page_id: uuid::Uuid,
    /// Write sequence number.
    pub seq: u64,
}
