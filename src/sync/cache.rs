//! Read-through cache with latency compensation.
//!
//! The cache holds the ordered list of writes the client has issued but the
//! store has not yet answered, plus the last confirmed state of every page a
//! live subscription follows. Views overlay the pending writes on the
//! confirmed state, so an owner sees their own write the moment it is
//! enqueued. A pending write is only overlaid when its actor owns the page,
//! so a write the store is bound to reject is never shown to anyone.
//!
//! Pages nobody follows are not cached: reads pass the state fetched from
//! the store and get the overlay on top of it.
//!
//! Every confirmation advances the cache clock. A store read taken before a
//! confirmation of a followed page is discarded when it lands, so it cannot
//! roll the cache back to a state older than the confirmed write.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};

use crate::domain::{OwnerId, Page, PageId, TimelineEvent};
use crate::store::WriteOp;

#[derive(Debug)]
struct CachedDoc {
    page: Option<Page>,
    /// Confirmed events in arrival order.
    events: Vec<TimelineEvent>,
    /// Set once a store read of the page has landed.
    loaded: bool,
    /// Set once a store read of the events has landed.
    events_loaded: bool,
    /// Clock value of the last confirmation folded in.
    confirmed_at: u64,
    watchers: usize,
}

#[derive(Debug)]
struct PendingWrite {
    seq: u64,
    actor: OwnerId,
    op: WriteOp,
    at: DateTime<Utc>,
}

/// A page with pending writes applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    /// The page, or `None` if it is absent or deleted.
    pub page: Option<Page>,
    /// Whether any pending write touches the page.
    pub has_pending_writes: bool,
}

/// Client-side cache of followed documents and pending writes.
#[derive(Debug, Default)]
pub struct LocalCache {
    docs: HashMap<PageId, CachedDoc>,
    pending: Vec<PendingWrite>,
    clock: u64,
}

impl LocalCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current confirmation clock. Take it before a store read and pass it
    /// to [`LocalCache::absorb_page`].
    #[must_use]
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    /// Number of cached documents.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.docs.len()
    }

    /// Keeps `page_id` cached until a matching [`LocalCache::unwatch`].
    pub fn watch(&mut self, page_id: PageId) {
        let clock = self.clock;
        self.docs
            .entry(page_id)
            .or_insert_with(|| CachedDoc {
                page: None,
                events: Vec::new(),
                loaded: false,
                events_loaded: false,
                confirmed_at: clock,
                watchers: 0,
            })
            .watchers += 1;
    }

    /// Releases one watch. The entry is evicted with its last watcher.
    pub fn unwatch(&mut self, page_id: PageId) {
        if let Entry::Occupied(mut entry) = self.docs.entry(page_id) {
            let doc = entry.get_mut();
            doc.watchers = doc.watchers.saturating_sub(1);
            if doc.watchers == 0 {
                entry.remove();
            }
        }
    }

    /// Takes a page read started at clock `read_at`.
    ///
    /// A followed page keeps the newer state when a write to it was
    /// confirmed since `read_at`; its view is current either way. For a page
    /// nobody follows nothing is stored, and the return value says whether
    /// no confirmation at all landed during the read.
    pub fn absorb_page(&mut self, page_id: PageId, page: Option<Page>, read_at: u64) -> bool {
        let Some(doc) = self.docs.get_mut(&page_id) else {
            return self.clock == read_at;
        };
        if !doc.loaded || doc.confirmed_at <= read_at {
            if page.is_none() {
                doc.events.clear();
                doc.events_loaded = true;
            }
            doc.page = page;
            doc.loaded = true;
        }
        true
    }

    /// Takes an event collection read. Same rules as
    /// [`LocalCache::absorb_page`], which must be called first.
    pub fn absorb_events(&mut self, page_id: PageId, events: Vec<TimelineEvent>, read_at: u64) -> bool {
        let Some(doc) = self.docs.get_mut(&page_id) else {
            return self.clock == read_at;
        };
        if !doc.events_loaded || doc.confirmed_at <= read_at {
            doc.events = events;
            doc.events_loaded = true;
        }
        true
    }

    /// Records a write that has been enqueued but not answered.
    pub fn push_pending(&mut self, seq: u64, actor: OwnerId, op: WriteOp, at: DateTime<Utc>) {
        self.pending.push(PendingWrite { seq, actor, op, at });
    }

    /// Folds a confirmed write into the confirmed state.
    pub fn confirm(&mut self, seq: u64) {
        let Some(pos) = self.pending.iter().position(|p| p.seq == seq) else {
            return;
        };
        let write = self.pending.remove(pos);
        self.clock = self.clock.wrapping_add(1);
        if let Some(doc) = self.docs.get_mut(&write.op.page_id()) {
            if doc.loaded {
                apply_op(&mut doc.page, &mut doc.events, &write.op, write.at);
            }
            doc.confirmed_at = self.clock;
        }
    }

    /// Drops a failed write, returning it.
    pub fn reject(&mut self, seq: u64) -> Option<WriteOp> {
        let pos = self.pending.iter().position(|p| p.seq == seq)?;
        Some(self.pending.remove(pos).op)
    }

    /// Returns the number of unanswered writes.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the page with pending writes applied. `fetched` is the store
    /// state and is used only when the page is not cached.
    #[must_use]
    pub fn page_view(&self, page_id: PageId, fetched: Option<Page>) -> PageView {
        let mut page = match self.docs.get(&page_id) {
            Some(doc) if doc.loaded => doc.page.clone(),
            _ => fetched,
        };
        let mut scratch = Vec::new();
        let mut has_pending_writes = false;
        for write in self.pending_for(page_id) {
            if permitted(&page, &write.actor, &write.op) {
                has_pending_writes = true;
                apply_op(&mut page, &mut scratch, &write.op, write.at);
            }
        }
        PageView {
            page,
            has_pending_writes,
        }
    }

    /// Returns the event collection (arrival order) with pending writes
    /// applied, and whether any pending write touched it. `fetched_page`
    /// and `fetched_events` are used only when the page is not cached.
    #[must_use]
    pub fn events_view(
        &self,
        page_id: PageId,
        fetched_page: Option<Page>,
        fetched_events: Vec<TimelineEvent>,
    ) -> (Vec<TimelineEvent>, bool) {
        let (mut page, mut events) = match self.docs.get(&page_id) {
            Some(doc) if doc.loaded && doc.events_loaded => (doc.page.clone(), doc.events.clone()),
            _ => (fetched_page, fetched_events),
        };
        let mut has_pending_writes = false;
        for write in self.pending_for(page_id) {
            if !permitted(&page, &write.actor, &write.op) {
                continue;
            }
            if touches_events(&write.op) {
                has_pending_writes = true;
            }
            apply_op(&mut page, &mut events, &write.op, write.at);
        }
        (events, has_pending_writes)
    }

    /// Overlays pending writes on an owner's page list read from the store.
    ///
    /// Pending creations appear, pending deletions disappear and pending
    /// field writes are applied. Newest first.
    #[must_use]
    pub fn owner_view(&self, owner: &OwnerId, confirmed: Vec<Page>) -> Vec<Page> {
        let mut pages: HashMap<PageId, Option<Page>> =
            confirmed.into_iter().map(|p| (p.id, Some(p))).collect();
        let mut scratch = Vec::new();
        for write in self.pending.iter().filter(|w| &w.actor == owner) {
            let slot = pages.entry(write.op.page_id()).or_insert(None);
            if permitted(slot, &write.actor, &write.op) {
                apply_op(slot, &mut scratch, &write.op, write.at);
            }
        }
        let mut out: Vec<Page> = pages
            .into_values()
            .flatten()
            .filter(|p| &p.owner == owner)
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        out
    }

    fn pending_for(&self, page_id: PageId) -> impl Iterator<Item = &PendingWrite> {
        self.pending.iter().filter(move |p| p.op.page_id() == page_id)
    }
}

/// Whether the store will accept `op` from `actor` given the page as it
/// stands: creations must be made by the new page's owner, everything else
/// by the owner of an existing page.
fn permitted(page: &Option<Page>, actor: &OwnerId, op: &WriteOp) -> bool {
    match op {
        WriteOp::CreatePage(new_page) => &new_page.owner == actor,
        _ => page.as_ref().is_some_and(|p| &p.owner == actor),
    }
}

const fn touches_events(op: &WriteOp) -> bool {
    matches!(
        op,
        WriteOp::CreateEvent(_)
            | WriteOp::UpdateEvent { .. }
            | WriteOp::DeleteEvent { .. }
            | WriteOp::DeletePage { .. }
    )
}

/// Applies one write to a page and its events. Idempotent for every
/// variant, so re-applying a write the store already reflects is harmless.
fn apply_op(
    page: &mut Option<Page>,
    events: &mut Vec<TimelineEvent>,
    op: &WriteOp,
    at: DateTime<Utc>,
) {
    match op {
        WriteOp::CreatePage(new_page) => {
            if page.is_none() {
                *page = Some((**new_page).clone());
            }
        }
        WriteOp::UpdatePage { patch, .. } => {
            if let Some(p) = page {
                p.apply(patch, at);
            }
        }
        WriteOp::DeletePage { .. } => {
            *page = None;
            events.clear();
        }
        WriteOp::CreateEvent(event) => {
            if !events.iter().any(|e| e.id == event.id) {
                events.push((**event).clone());
            }
        }
        WriteOp::UpdateEvent {
            event_id, patch, ..
        } => {
            if let Some(e) = events.iter_mut().find(|e| e.id == *event_id) {
                e.apply(patch, at);
            }
        }
        WriteOp::DeleteEvent { event_id, .. } => {
            events.retain(|e| e.id != *event_id);
        }
    }
}
