//! Document store: the external keyed document service.
//!
//! The store is the source of truth for pages and their events. This
//! module defines the [`DocumentStore`] trait the rest of the crate talks
//! to, the write operations it accepts, and two implementations:
//! [`MemoryStore`] (default, tests) and [`PostgresStore`] (`sqlx`).
//!
//! Authorization lives here as well: every write names the acting
//! identity and the store refuses writes to pages the actor does not own.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::domain::{
    EventId, EventPatch, OwnerId, Page, PageId, PagePatch, StoreChange, TimelineEvent,
    parse_event_date,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Failures reported by a [`DocumentStore`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The page does not exist.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// The event does not exist on the page.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The acting identity may not perform this write.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A write against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new page.
    CreatePage(Box<Page>),
    /// Write one page field.
    UpdatePage {
        /// Target page.
        page_id: PageId,
        /// Field mutation.
        patch: PagePatch,
    },
    /// Remove a page and all of its events.
    DeletePage {
        /// Target page.
        page_id: PageId,
    },
    /// Append an event to a page.
    CreateEvent(Box<TimelineEvent>),
    /// Write one event field.
    UpdateEvent {
        /// Owning page.
        page_id: PageId,
        /// Target event.
        event_id: EventId,
        /// Field mutation.
        patch: EventPatch,
    },
    /// Remove one event.
    DeleteEvent {
        /// Owning page.
        page_id: PageId,
        /// Target event.
        event_id: EventId,
    },
}

impl WriteOp {
    /// Returns the page this write targets.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        match self {
            Self::CreatePage(page) => page.id,
            Self::CreateEvent(event) => event.page_id,
            Self::UpdatePage { page_id, .. }
            | Self::DeletePage { page_id }
            | Self::UpdateEvent { page_id, .. }
            | Self::DeleteEvent { page_id, .. } => *page_id,
        }
    }

    /// Returns a short name for logs and failure notices.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreatePage(_) => "create_page",
            Self::UpdatePage { .. } => "update_page",
            Self::DeletePage { .. } => "delete_page",
            Self::CreateEvent(_) => "create_event",
            Self::UpdateEvent { .. } => "update_event",
            Self::DeleteEvent { .. } => "delete_event",
        }
    }
}

/// Inclusive date range for event queries.
///
/// Bounded ranges only match events whose date parses; unparsable dates
/// are returned by [`EventRange::all`] alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRange {
    /// Earliest date to include.
    pub from: Option<NaiveDate>,
    /// Latest date to include.
    pub to: Option<NaiveDate>,
}

impl EventRange {
    /// The unbounded range.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    /// Returns `true` if this range has no bounds.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Returns `true` if the event falls inside the range.
    #[must_use]
    pub fn contains(&self, event: &TimelineEvent) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = event.date.as_deref().and_then(parse_event_date) else {
            return false;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// The keyed document service holding pages and their event collections.
///
/// Implementations must apply writes for one caller in the order they are
/// issued and publish a [`StoreChange`] after every applied write.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Reads one page document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] or [`StoreError::Backend`] if the
    /// read fails. A missing page is `Ok(None)`.
    async fn get_page(&self, page_id: PageId) -> Result<Option<Page>, StoreError>;

    /// Exact, case-sensitive lookup on the access-code field.
    ///
    /// Results come back in store order: creation time, then id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] or [`StoreError::Backend`] if the
    /// query fails.
    async fn find_pages_by_access_code(&self, code: &str) -> Result<Vec<PageId>, StoreError>;

    /// Lists every page owned by `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] or [`StoreError::Backend`] if the
    /// query fails.
    async fn list_pages_by_owner(&self, owner: &OwnerId) -> Result<Vec<Page>, StoreError>;

    /// Lists a page's events within `range`, ordered by date with arrival
    /// order preserved among equal dates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PageNotFound`] if the page does not exist, or
    /// [`StoreError::Unavailable`] / [`StoreError::Backend`] on failure.
    async fn list_events(
        &self,
        page_id: PageId,
        range: EventRange,
    ) -> Result<Vec<TimelineEvent>, StoreError>;

    /// Applies one write on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PermissionDenied`] if `actor` does not own the
    /// target page, [`StoreError::PageNotFound`] /
    /// [`StoreError::EventNotFound`] if the target is missing, or
    /// [`StoreError::Unavailable`] / [`StoreError::Backend`] on failure.
    async fn apply(&self, actor: &OwnerId, op: WriteOp) -> Result<(), StoreError>;

    /// Subscribes to change notifications for all future writes.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

/// Checks that `actor` owns `page`.
///
/// # Errors
///
/// Returns [`StoreError::PermissionDenied`] when the owners differ.
pub(crate) fn ensure_owner(actor: &OwnerId, page: &Page) -> Result<(), StoreError> {
    if &page.owner == actor {
        Ok(())
    } else {
        Err(StoreError::PermissionDenied(format!(
            "{actor} does not own page {}",
            page.id
        )))
    }
}

/// Sorts events the way the store returns them: by parsed date (unparsable
/// first), keeping arrival order among equals.
pub(crate) fn sort_for_query(events: &mut [TimelineEvent]) {
    events.sort_by_key(|e| e.parsed_date().unwrap_or(NaiveDate::MIN));
}
