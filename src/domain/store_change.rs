//! Change notifications published by the document store.
//!
//! Every confirmed write emits a [`StoreChange`] through the
//! [`super::ChangeBus`]. Notifications are deliberately thin: they say which
//! document moved, and subscribers re-read it. That keeps the bus
//! independent of the payload shape and lets lagging subscribers recover by
//! simply re-reading.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EventId, OwnerId, PageId};

/// Notification emitted after the store applied a write.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum StoreChange {
    /// A page document was created.
    PageCreated {
        /// Page identifier.
        page_id: PageId,
        /// Owner of the new page.
        owner: OwnerId,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },

    /// One field of a page document changed.
    PageUpdated {
        /// Page identifier.
        page_id: PageId,
        /// Field that was written.
        field: &'static str,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },

    /// A page and all of its events were removed.
    PageDeleted {
        /// Page identifier.
        page_id: PageId,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },

    /// An event was added to a page.
    EventCreated {
        /// Owning page.
        page_id: PageId,
        /// New event.
        event_id: EventId,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },

    /// One field of an event changed.
    EventUpdated {
        /// Owning page.
        page_id: PageId,
        /// Changed event.
        event_id: EventId,
        /// Field that was written.
        field: &'static str,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },

    /// An event was removed from a page.
    EventDeleted {
        /// Owning page.
        page_id: PageId,
        /// Removed event.
        event_id: EventId,
        /// Time the store applied the write.
        timestamp: DateTime<Utc>,
    },
}

impl StoreChange {
    /// Returns the page this change belongs to.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        match self {
            Self::PageCreated { page_id, .. }
            | Self::PageUpdated { page_id, .. }
            | Self::PageDeleted { page_id, .. }
            | Self::EventCreated { page_id, .. }
            | Self::EventUpdated { page_id, .. }
            | Self::EventDeleted { page_id, .. } => *page_id,
        }
    }

    /// Returns `true` if the page document itself changed.
    #[must_use]
    pub const fn touches_page(&self) -> bool {
        matches!(
            self,
            Self::PageCreated { .. } | Self::PageUpdated { .. } | Self::PageDeleted { .. }
        )
    }

    /// Returns `true` if the page's event collection changed.
    ///
    /// Page deletion counts: it empties the collection.
    #[must_use]
    pub const fn touches_events(&self) -> bool {
        matches!(
            self,
            Self::EventCreated { .. }
                | Self::EventUpdated { .. }
                | Self::EventDeleted { .. }
                | Self::PageDeleted { .. }
        )
    }

    /// Returns the change type as a static string slice.
    #[must_use]
    pub const fn change_type_str(&self) -> &'static str {
        match self {
            Self::PageCreated { .. } => "page_created",
            Self::PageUpdated { .. } => "page_updated",
            Self::PageDeleted { .. } => "page_deleted",
            Self::EventCreated { .. } => "event_created",
            Self::EventUpdated { .. } => "event_updated",
            Self::EventDeleted { .. } => "event_deleted",
        }
    }
}
