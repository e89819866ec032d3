//! PostgreSQL implementation of the document store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;

use super::models::{EventRow, PageRow};
use super::{DocumentStore, EventRange, StoreError, WriteOp, ensure_owner, sort_for_query};
use crate::domain::{
    ChangeBus, EventId, EventPatch, OwnerId, Page, PageId, PagePatch, StoreChange, TimelineEvent,
};

const PAGE_COLUMNS: &str = "id, owner, recipient_name, title, occasion, font, layout, soundtrack, \
     voice_note_ref, voice_note_secs, closing_quote, access_code, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, page_id, title, story, image, event_date, order_hint, created_at, updated_at";

/// PostgreSQL-backed [`DocumentStore`] using `sqlx::PgPool`.
///
/// Change notifications are published on an in-process [`ChangeBus`] after
/// each successful write, so every subscriber must share this instance.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    changes: ChangeBus,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool, change_capacity: usize) -> Self {
        Self {
            pool,
            changes: ChangeBus::new(change_capacity),
        }
    }

    /// Connects to `database_url` and runs the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be
    /// reached, or [`StoreError::Backend`] if migrations fail.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
        change_capacity: usize,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tracing::info!(max_connections, "postgres store ready");
        Ok(Self::new(pool, change_capacity))
    }

    /// Runs one write inside its own transaction, so the ownership check and
    /// the statement that depends on it see the same row.
    async fn apply_inner(&self, actor: &OwnerId, op: WriteOp) -> Result<StoreChange, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let change = apply_in(&mut tx, actor, op).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(change)
    }
}

async fn apply_in(
    conn: &mut PgConnection,
    actor: &OwnerId,
    op: WriteOp,
) -> Result<StoreChange, StoreError> {
    let timestamp = Utc::now();
    match op {
        WriteOp::CreatePage(page) => {
            ensure_owner(actor, &page)?;
            insert_page(conn, &page).await?;
            Ok(StoreChange::PageCreated {
                page_id: page.id,
                owner: page.owner.clone(),
                timestamp,
            })
        }
        WriteOp::UpdatePage { page_id, patch } => {
            lock_owned_page(conn, actor, page_id).await?;
            update_page(conn, page_id, &patch).await?;
            Ok(StoreChange::PageUpdated {
                page_id,
                field: patch.field(),
                timestamp,
            })
        }
        WriteOp::DeletePage { page_id } => {
            lock_owned_page(conn, actor, page_id).await?;
            // Events go with the page via ON DELETE CASCADE.
            sqlx::query("DELETE FROM pages WHERE id = $1")
                .bind(page_id.as_uuid())
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx)?;
            Ok(StoreChange::PageDeleted { page_id, timestamp })
        }
        WriteOp::CreateEvent(event) => {
            lock_owned_page(conn, actor, event.page_id).await?;
            insert_event(conn, &event).await?;
            Ok(StoreChange::EventCreated {
                page_id: event.page_id,
                event_id: event.id,
                timestamp,
            })
        }
        WriteOp::UpdateEvent {
            page_id,
            event_id,
            patch,
        } => {
            lock_owned_page(conn, actor, page_id).await?;
            update_event(conn, page_id, event_id, &patch).await?;
            Ok(StoreChange::EventUpdated {
                page_id,
                event_id,
                field: patch.field(),
                timestamp,
            })
        }
        WriteOp::DeleteEvent { page_id, event_id } => {
            lock_owned_page(conn, actor, page_id).await?;
            let result = sqlx::query("DELETE FROM events WHERE id = $1 AND page_id = $2")
                .bind(event_id.as_uuid())
                .bind(page_id.as_uuid())
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::EventNotFound(event_id));
            }
            Ok(StoreChange::EventDeleted {
                page_id,
                event_id,
                timestamp,
            })
        }
    }
}

/// Locks the page row until the transaction ends and checks its owner.
async fn lock_owned_page(
    conn: &mut PgConnection,
    actor: &OwnerId,
    page_id: PageId,
) -> Result<(), StoreError> {
    let owner = sqlx::query_scalar::<_, String>("SELECT owner FROM pages WHERE id = $1 FOR UPDATE")
        .bind(page_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    check_stored_owner(actor, page_id, owner.as_deref())
}

fn check_stored_owner(
    actor: &OwnerId,
    page_id: PageId,
    owner: Option<&str>,
) -> Result<(), StoreError> {
    match owner {
        None => Err(StoreError::PageNotFound(page_id)),
        Some(owner) if owner == actor.as_str() => Ok(()),
        Some(_) => Err(StoreError::PermissionDenied(format!(
            "{actor} does not own page {page_id}"
        ))),
    }
}

async fn insert_page(conn: &mut PgConnection, page: &Page) -> Result<(), StoreError> {
    let voice_ref = page.voice_note.as_ref().map(|v| v.reference.clone());
    let voice_secs = page
        .voice_note
        .as_ref()
        .map(|v| i32::try_from(v.duration_secs).unwrap_or(i32::MAX));
    sqlx::query(
        "INSERT INTO pages (id, owner, recipient_name, title, occasion, font, layout, \
         soundtrack, voice_note_ref, voice_note_secs, closing_quote, access_code, \
         created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(page.id.as_uuid())
    .bind(page.owner.as_str())
    .bind(&page.recipient_name)
    .bind(&page.title)
    .bind(page.occasion.as_str())
    .bind(&page.font)
    .bind(page.layout.as_str())
    .bind(&page.soundtrack)
    .bind(voice_ref)
    .bind(voice_secs)
    .bind(&page.closing_quote)
    .bind(page.access_code.as_str())
    .bind(page.created_at)
    .bind(page.updated_at)
    .execute(conn)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

async fn update_page(
    conn: &mut PgConnection,
    page_id: PageId,
    patch: &PagePatch,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let result = if let PagePatch::VoiceNote(note) = patch {
        sqlx::query(
            "UPDATE pages SET voice_note_ref = $1, voice_note_secs = $2, updated_at = $3 \
             WHERE id = $4",
        )
        .bind(note.as_ref().map(|n| n.reference.clone()))
        .bind(
            note.as_ref()
                .map(|n| i32::try_from(n.duration_secs).unwrap_or(i32::MAX)),
        )
        .bind(now)
        .bind(page_id.as_uuid())
        .execute(conn)
        .await
    } else {
        // Column names come from a closed set of static field names.
        let sql = format!(
            "UPDATE pages SET {} = $1, updated_at = $2 WHERE id = $3",
            patch.field()
        );
        sqlx::query(&sql)
            .bind(page_text_value(patch))
            .bind(now)
            .bind(page_id.as_uuid())
            .execute(conn)
            .await
    }
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::PageNotFound(page_id));
    }
    Ok(())
}

async fn insert_event(conn: &mut PgConnection, event: &TimelineEvent) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO events (id, page_id, title, story, image, event_date, order_hint, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(event.id.as_uuid())
    .bind(event.page_id.as_uuid())
    .bind(&event.title)
    .bind(&event.story)
    .bind(&event.image)
    .bind(&event.date)
    .bind(event.order)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(conn)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

async fn update_event(
    conn: &mut PgConnection,
    page_id: PageId,
    event_id: EventId,
    patch: &EventPatch,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE events SET {} = $1, updated_at = $2 WHERE id = $3 AND page_id = $4",
        event_column(patch)
    );
    let query = sqlx::query(&sql);
    let query = match patch {
        EventPatch::Order(order) => query.bind(*order),
        other => query.bind(event_text_value(other)),
    };
    let result = query
        .bind(now)
        .bind(event_id.as_uuid())
        .bind(page_id.as_uuid())
        .execute(conn)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(StoreError::EventNotFound(event_id));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get_page(&self, page_id: PageId) -> Result<Option<Page>, StoreError> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1");
        let row = sqlx::query_as::<_, PageRow>(&sql)
            .bind(page_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Page::try_from).transpose()
    }

    async fn find_pages_by_access_code(&self, code: &str) -> Result<Vec<PageId>, StoreError> {
        let ids = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT id FROM pages WHERE access_code = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(ids.into_iter().map(PageId::from_uuid).collect())
    }

    async fn list_pages_by_owner(&self, owner: &OwnerId) -> Result<Vec<Page>, StoreError> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE owner = $1 ORDER BY created_at DESC, id ASC"
        );
        let rows = sqlx::query_as::<_, PageRow>(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(Page::try_from).collect()
    }

    async fn list_events(
        &self,
        page_id: PageId,
        range: EventRange,
    ) -> Result<Vec<TimelineEvent>, StoreError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages WHERE id = $1")
            .bind(page_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if exists == 0 {
            return Err(StoreError::PageNotFound(page_id));
        }

        // Dates are free text, so range filtering happens after parsing.
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE page_id = $1 ORDER BY seq ASC");
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(page_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        let mut events: Vec<TimelineEvent> = rows
            .into_iter()
            .map(TimelineEvent::from)
            .filter(|e| range.contains(e))
            .collect();
        sort_for_query(&mut events);
        Ok(events)
    }

    async fn apply(&self, actor: &OwnerId, op: WriteOp) -> Result<(), StoreError> {
        let change = self.apply_inner(actor, op).await?;
        let _ = self.changes.publish(change);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Text value written by a non-voice-note page patch.
fn page_text_value(patch: &PagePatch) -> Option<String> {
    match patch {
        PagePatch::Title(v) | PagePatch::RecipientName(v) | PagePatch::Font(v) => Some(v.clone()),
        PagePatch::Occasion(v) => Some(v.as_str().to_string()),
        PagePatch::Layout(v) => Some(v.as_str().to_string()),
        PagePatch::Soundtrack(v) | PagePatch::ClosingQuote(v) => v.clone(),
        PagePatch::VoiceNote(_) => None,
    }
}

/// Column written by an event patch.
const fn event_column(patch: &EventPatch) -> &'static str {
    match patch {
        EventPatch::Title(_) => "title",
        EventPatch::Story(_) => "story",
        EventPatch::Image(_) => "image",
        EventPatch::Date(_) => "event_date",
        EventPatch::Order(_) => "order_hint",
    }
}

/// Text value written by a non-order event patch.
fn event_text_value(patch: &EventPatch) -> Option<String> {
    match patch {
        EventPatch::Title(v) | EventPatch::Story(v) => Some(v.clone()),
        EventPatch::Image(v) | EventPatch::Date(v) => v.clone(),
        EventPatch::Order(_) => None,
    }
}

/// Splits connection-level failures (transient) from everything else.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LayoutVariant, Occasion};

    #[test]
    fn stored_owner_gates_writes() {
        let page_id = PageId::new();
        let actor = OwnerId::new("user-1");
        assert!(check_stored_owner(&actor, page_id, Some("user-1")).is_ok());
        assert!(matches!(
            check_stored_owner(&actor, page_id, Some("user-2")),
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(matches!(
            check_stored_owner(&actor, page_id, None),
            Err(StoreError::PageNotFound(id)) if id == page_id
        ));
    }

    #[test]
    fn text_values_use_stored_enum_forms() {
        assert_eq!(
            page_text_value(&PagePatch::Layout(LayoutVariant::Carousel)).as_deref(),
            Some("carousel")
        );
        assert_eq!(
            page_text_value(&PagePatch::Occasion(Occasion::Wedding)).as_deref(),
            Some("wedding")
        );
        assert_eq!(page_text_value(&PagePatch::ClosingQuote(None)), None);
    }

    #[test]
    fn event_date_patch_targets_raw_date_column() {
        assert_eq!(event_column(&EventPatch::Date(None)), "event_date");
        assert_eq!(event_column(&EventPatch::Order(2)), "order_hint");
        assert_eq!(
            event_text_value(&EventPatch::Date(Some("2021-01-01".into()))).as_deref(),
            Some("2021-01-01")
        );
    }

    #[test]
    fn pool_timeouts_are_transient() {
        assert!(matches!(map_sqlx(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
        assert!(matches!(map_sqlx(sqlx::Error::RowNotFound), StoreError::Backend(_)));
    }
}
