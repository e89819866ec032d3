//! Database rows for pages and events.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::domain::{
    AccessCode, EventId, LayoutVariant, Occasion, OwnerId, Page, PageId, TimelineEvent, VoiceNote,
};

/// A row from the `pages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageRow {
    /// Page UUID.
    pub id: Uuid,
    /// Owner identity string.
    pub owner: String,
    /// Recipient name.
    pub recipient_name: String,
    /// Title.
    pub title: String,
    /// Occasion as stored text.
    pub occasion: String,
    /// Display font.
    pub font: String,
    /// Layout as stored text.
    pub layout: String,
    /// Soundtrack reference.
    pub soundtrack: Option<String>,
    /// Voice note reference.
    pub voice_note_ref: Option<String>,
    /// Voice note duration in seconds.
    pub voice_note_secs: Option<i32>,
    /// Closing quote.
    pub closing_quote: Option<String>,
    /// Access code.
    pub access_code: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PageRow> for Page {
    type Error = StoreError;

    /// Validates a row at the store boundary.
    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        let occasion: Occasion = row.occasion.parse().map_err(StoreError::Backend)?;
        let layout: LayoutVariant = row.layout.parse().map_err(StoreError::Backend)?;
        let access_code = AccessCode::parse(&row.access_code)
            .map_err(|e| StoreError::Backend(format!("page {}: {e}", row.id)))?;
        let voice_note = match (row.voice_note_ref, row.voice_note_secs) {
            (Some(reference), secs) => Some(VoiceNote {
                reference,
                duration_secs: secs.and_then(|s| u32::try_from(s).ok()).unwrap_or(0),
            }),
            (None, _) => None,
        };
        Ok(Self {
            id: PageId::from_uuid(row.id),
            owner: OwnerId::new(row.owner),
            recipient_name: row.recipient_name,
            title: row.title,
            occasion,
            font: row.font,
            layout,
            soundtrack: row.soundtrack,
            voice_note,
            closing_quote: row.closing_quote,
            access_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event UUID.
    pub id: Uuid,
    /// Owning page UUID.
    pub page_id: Uuid,
    /// Title.
    pub title: String,
    /// Story text.
    pub story: String,
    /// Image reference.
    pub image: Option<String>,
    /// Raw date string.
    pub event_date: Option<String>,
    /// Order hint.
    pub order_hint: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<EventRow> for TimelineEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId::from_uuid(row.id),
            page_id: PageId::from_uuid(row.page_id),
            title: row.title,
            story: row.story,
            image: row.image,
            date: row.event_date,
            order: row.order_hint,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
