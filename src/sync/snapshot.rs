//! Snapshots yielded by live subscriptions.

use serde::Serialize;

use crate::domain::{Page, PageId, TimelineEvent};

/// State of one page document as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageSnapshot {
    /// The page exists.
    Present {
        /// Page document with pending local writes applied.
        page: Page,
        /// `true` while at least one local write to the page is unconfirmed.
        has_pending_writes: bool,
    },
    /// The page was deleted. Always the last item of a page stream.
    Deleted {
        /// The deleted page.
        page_id: PageId,
    },
}

impl PageSnapshot {
    /// Returns the page if it still exists.
    #[must_use]
    pub fn page(&self) -> Option<&Page> {
        match self {
            Self::Present { page, .. } => Some(page),
            Self::Deleted { .. } => None,
        }
    }
}

/// Ordered event collection of one page as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    /// Owning page.
    pub page_id: PageId,
    /// Events in display order.
    pub events: Vec<TimelineEvent>,
    /// `true` while at least one local write to the collection is unconfirmed.
    pub has_pending_writes: bool,
}
