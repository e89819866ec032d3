//! Page DTOs for the owner dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event_dto::EventDto;
use crate::domain::{LayoutVariant, NewPage, Occasion, Page, VoiceNote, public_path};
use crate::service::{CreatedPage, Dashboard};

/// Request body for `POST /pages`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreatePageRequest {
    /// Name of the person the page is for.
    #[serde(default)]
    pub recipient_name: Option<String>,
    /// Page title; defaults to "Our Story".
    #[serde(default)]
    pub title: Option<String>,
    /// Occasion; defaults to `other`.
    #[serde(default)]
    pub occasion: Option<Occasion>,
    /// Display font; defaults to `serif`.
    #[serde(default)]
    pub font: Option<String>,
    /// Layout; defaults to `linear`.
    #[serde(default)]
    pub layout: Option<LayoutVariant>,
}

impl From<CreatePageRequest> for NewPage {
    fn from(req: CreatePageRequest) -> Self {
        Self {
            recipient_name: req.recipient_name,
            title: req.title,
            occasion: req.occasion,
            font: req.font,
            layout: req.layout,
        }
    }
}

/// Response body for `POST /pages` (201 Created).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatePageResponse {
    /// Page identifier.
    pub page_id: uuid::Uuid,
    /// Access code granting read access.
    pub access_code: String,
    /// Cosmetic slug.
    pub slug: String,
    /// Relative public path.
    pub public_path: String,
    /// Absolute public URL.
    pub public_url: String,
    /// Sequence number of the creation write.
    pub seq: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<CreatedPage> for CreatePageResponse {
    fn from(created: CreatedPage) -> Self {
        Self {
            page_id: *created.page.id.as_uuid(),
            access_code: created.page.access_code.to_string(),
            slug: created.slug,
            public_path: created.public_path,
            public_url: created.public_url,
            seq: created.ticket.seq,
            created_at: created.page.created_at,
        }
    }
}

/// Owner-facing page representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageDto {
    /// Page identifier.
    pub id: uuid::Uuid,
    /// Recipient name.
    pub recipient_name: String,
    /// Title.
    pub title: String,
    /// Occasion.
    pub occasion: Occasion,
    /// Display font.
    pub font: String,
    /// Layout.
    pub layout: LayoutVariant,
    /// Soundtrack reference.
    pub soundtrack: Option<String>,
    /// Voice note.
    pub voice_note: Option<VoiceNote>,
    /// Closing quote.
    pub closing_quote: Option<String>,
    /// Access code.
    pub access_code: String,
    /// Relative public path.
    pub public_path: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&Page> for PageDto {
    fn from(page: &Page) -> Self {
        Self {
            id: *page.id.as_uuid(),
            recipient_name: page.recipient_name.clone(),
            title: page.title.clone(),
            occasion: page.occasion,
            font: page.font.clone(),
            layout: page.layout,
            soundtrack: page.soundtrack.clone(),
            voice_note: page.voice_note.clone(),
            closing_quote: page.closing_quote.clone(),
            access_code: page.access_code.to_string(),
            public_path: public_path(&page.slug(), &page.access_code),
            created_at: page.created_at,
            updated_at: page.updated_at,
        }
    }
}

/// Response body for `GET /pages`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageListResponse {
    /// Pages, newest first.
    pub pages: Vec<PageDto>,
    /// Number of pages.
    pub total: usize,
}

/// Response body for `GET /pages/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardResponse {
    /// The page.
    pub page: PageDto,
    /// Events in display order.
    pub events: Vec<EventDto>,
    /// Whether any of the owner's writes are still unconfirmed.
    pub has_pending_writes: bool,
    /// Absolute public URL.
    pub public_url: String,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            page: PageDto::from(&dashboard.page),
            events: dashboard.timeline.events.iter().map(EventDto::from).collect(),
            has_pending_writes: dashboard.timeline.has_pending_writes,
            public_url: dashboard.public_url,
        }
    }
}
