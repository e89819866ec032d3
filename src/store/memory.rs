//! In-process document store.
//!
//! [`MemoryStore`] keeps every page in a `HashMap` where each document is
//! individually protected by a [`tokio::sync::RwLock`]. Reads of the same
//! page run concurrently, writes to different pages run concurrently, and
//! writes to one page are serialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};

use super::{DocumentStore, EventRange, StoreError, WriteOp, ensure_owner, sort_for_query};
use crate::domain::{ChangeBus, OwnerId, Page, PageId, StoreChange, TimelineEvent};

/// A page document together with its event collection.
#[derive(Debug)]
struct PageDoc {
    page: Page,
    /// Events in arrival order.
    events: Vec<TimelineEvent>,
}

/// In-memory [`DocumentStore`].
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-document
/// `Arc<RwLock<PageDoc>>` for fine-grained locking. The store can be taken
/// offline with [`MemoryStore::set_available`] to exercise the transient
/// failure paths.
#[derive(Debug)]
pub struct MemoryStore {
    pages: RwLock<HashMap<PageId, Arc<RwLock<PageDoc>>>>,
    changes: ChangeBus,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store whose change bus buffers `capacity` changes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            changes: ChangeBus::new(capacity),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the store becoming reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of pages in the store.
    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    /// Returns `true` if the store holds no pages.
    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    async fn doc(&self, page_id: PageId) -> Result<Arc<RwLock<PageDoc>>, StoreError> {
        let map = self.pages.read().await;
        map.get(&page_id)
            .cloned()
            .ok_or(StoreError::PageNotFound(page_id))
    }

    async fn apply_inner(&self, actor: &OwnerId, op: WriteOp) -> Result<StoreChange, StoreError> {
        let timestamp = Utc::now();
        match op {
            WriteOp::CreatePage(page) => {
                if &page.owner != actor {
                    return Err(StoreError::PermissionDenied(format!(
                        "{actor} cannot create a page owned by {}",
                        page.owner
                    )));
                }
                let page_id = page.id;
                let owner = page.owner.clone();
                let mut map = self.pages.write().await;
                if map.contains_key(&page_id) {
                    return Err(StoreError::Backend(format!("page {page_id} already exists")));
                }
                let doc = PageDoc {
                    page: *page,
                    events: Vec::new(),
                };
                map.insert(page_id, Arc::new(RwLock::new(doc)));
                Ok(StoreChange::PageCreated {
                    page_id,
                    owner,
                    timestamp,
                })
            }
            WriteOp::UpdatePage { page_id, patch } => {
                let doc_lock = self.doc(page_id).await?;
                let mut doc = doc_lock.write().await;
                ensure_owner(actor, &doc.page)?;
                doc.page.apply(&patch, timestamp);
                Ok(StoreChange::PageUpdated {
                    page_id,
                    field: patch.field(),
                    timestamp,
                })
            }
            WriteOp::DeletePage { page_id } => {
                let mut map = self.pages.write().await;
                let doc_lock = map
                    .get(&page_id)
                    .cloned()
                    .ok_or(StoreError::PageNotFound(page_id))?;
                ensure_owner(actor, &doc_lock.read().await.page)?;
                map.remove(&page_id);
                Ok(StoreChange::PageDeleted { page_id, timestamp })
            }
            WriteOp::CreateEvent(event) => {
                let page_id = event.page_id;
                let event_id = event.id;
                let doc_lock = self.doc(page_id).await?;
                let mut doc = doc_lock.write().await;
                ensure_owner(actor, &doc.page)?;
                if doc.events.iter().any(|e| e.id == event_id) {
                    return Err(StoreError::Backend(format!("event {event_id} already exists")));
                }
                doc.events.push(*event);
                Ok(StoreChange::EventCreated {
                    page_id,
                    event_id,
                    timestamp,
                })
            }
            WriteOp::UpdateEvent {
                page_id,
                event_id,
                patch,
            } => {
                let doc_lock = self.doc(page_id).await?;
                let mut doc = doc_lock.write().await;
                ensure_owner(actor, &doc.page)?;
                let event = doc
                    .events
                    .iter_mut()
                    .find(|e| e.id == event_id)
                    .ok_or(StoreError::EventNotFound(event_id))?;
                event.apply(&patch, timestamp);
                Ok(StoreChange::EventUpdated {
                    page_id,
                    event_id,
                    field: patch.field(),
                    timestamp,
                })
            }
            WriteOp::DeleteEvent { page_id, event_id } => {
                let doc_lock = self.doc(page_id).await?;
                let mut doc = doc_lock.write().await;
                ensure_owner(actor, &doc.page)?;
                let before = doc.events.len();
                doc.events.retain(|e| e.id != event_id);
                if doc.events.len() == before {
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
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_page(&self, page_id: PageId) -> Result<Option<Page>, StoreError> {
        self.check_available()?;
        let map = self.pages.read().await;
        let Some(doc_lock) = map.get(&page_id) else {
            return Ok(None);
        };
        Ok(Some(doc_lock.read().await.page.clone()))
    }

    async fn find_pages_by_access_code(&self, code: &str) -> Result<Vec<PageId>, StoreError> {
        self.check_available()?;
        let map = self.pages.read().await;
        let mut matches = Vec::new();
        for doc_lock in map.values() {
            let doc = doc_lock.read().await;
            if doc.page.access_code.as_str() == code {
                matches.push((doc.page.created_at, doc.page.id));
            }
        }
        matches.sort();
        Ok(matches.into_iter().map(|(_, id)| id).collect())
    }

    async fn list_pages_by_owner(&self, owner: &OwnerId) -> Result<Vec<Page>, StoreError> {
        self.check_available()?;
        let map = self.pages.read().await;
        let mut pages = Vec::new();
        for doc_lock in map.values() {
            let doc = doc_lock.read().await;
            if &doc.page.owner == owner {
                pages.push(doc.page.clone());
            }
        }
        pages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(pages)
    }

    async fn list_events(
        &self,
        page_id: PageId,
        range: EventRange,
    ) -> Result<Vec<TimelineEvent>, StoreError> {
        self.check_available()?;
        let doc_lock = self.doc(page_id).await?;
        let doc = doc_lock.read().await;
        let mut events: Vec<TimelineEvent> = doc
            .events
            .iter()
            .filter(|e| range.contains(e))
            .cloned()
            .collect();
        sort_for_query(&mut events);
        Ok(events)
    }

    async fn apply(&self, actor: &OwnerId, op: WriteOp) -> Result<(), StoreError> {
        self.check_available()?;
        let change = self.apply_inner(actor, op).await?;
        let _ = self.changes.publish(change);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AccessCode, EventId, EventPatch, NewPage, PagePatch};
    use chrono::NaiveDate;

    fn owner() -> OwnerId {
        OwnerId::new("owner-1")
    }

    fn make_page(code: &str) -> Page {
        let Ok(code) = AccessCode::parse(code) else {
            panic!("valid code");
        };
        Page::new(PageId::new(), owner(), code, NewPage::default(), Utc::now())
    }

    fn make_event(page_id: PageId, date: &str) -> TimelineEvent {
        let Some(today) = NaiveDate::from_ymd_opt(2020, 1, 1) else {
            panic!("valid date");
        };
        let mut ev = TimelineEvent::placeholder(EventId::new(), page_id, 0, today, Utc::now());
        ev.date = Some(date.to_string());
        ev
    }

    async fn store_with_page(code: &str) -> (MemoryStore, PageId) {
        let store = MemoryStore::default();
        let page = make_page(code);
        let id = page.id;
        let Ok(()) = store.apply(&owner(), WriteOp::CreatePage(Box::new(page))).await else {
            panic!("create failed");
        };
        (store, id)
    }

    #[tokio::test]
    async fn create_and_find_by_code() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        let found = store.find_pages_by_access_code("AB3DEFGH9K").await;
        assert!(matches!(found.as_deref(), Ok([only]) if *only == id));

        let lower = store.find_pages_by_access_code("ab3defgh9k").await;
        assert!(matches!(lower.as_deref(), Ok([])));
    }

    #[tokio::test]
    async fn apply_publishes_change() {
        let store = MemoryStore::default();
        let mut rx = store.changes();
        let page = make_page("AB3DEFGH9K");
        let id = page.id;
        let _ = store.apply(&owner(), WriteOp::CreatePage(Box::new(page))).await;

        let Ok(change) = rx.recv().await else {
            panic!("expected change");
        };
        assert_eq!(change.page_id(), id);
        assert_eq!(change.change_type_str(), "page_created");
    }

    #[tokio::test]
    async fn non_owner_writes_are_denied() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        let result = store
            .apply(
                &OwnerId::new("intruder"),
                WriteOp::UpdatePage {
                    page_id: id,
                    patch: PagePatch::Title("mine now".into()),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));

        let Ok(Some(page)) = store.get_page(id).await else {
            panic!("page missing");
        };
        assert_ne!(page.title, "mine now");
    }

    #[tokio::test]
    async fn delete_page_removes_events_and_code_hits() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        let _ = store
            .apply(&owner(), WriteOp::CreateEvent(Box::new(make_event(id, "2021-01-01"))))
            .await;
        let result = store.apply(&owner(), WriteOp::DeletePage { page_id: id }).await;
        assert!(result.is_ok());

        let found = store.find_pages_by_access_code("AB3DEFGH9K").await;
        assert!(matches!(found.as_deref(), Ok([])));
        let events = store.list_events(id, EventRange::all()).await;
        assert!(matches!(events, Err(StoreError::PageNotFound(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_events_orders_by_date_and_filters_range() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        for date in ["2021-06-01", "2021-01-01", "2021-03-01"] {
            let _ = store
                .apply(&owner(), WriteOp::CreateEvent(Box::new(make_event(id, date))))
                .await;
        }
        let Ok(all) = store.list_events(id, EventRange::all()).await else {
            panic!("list failed");
        };
        let dates: Vec<_> = all.iter().filter_map(|e| e.date.clone()).collect();
        assert_eq!(dates, vec!["2021-01-01", "2021-03-01", "2021-06-01"]);

        let range = EventRange {
            from: NaiveDate::from_ymd_opt(2021, 2, 1),
            to: None,
        };
        let Ok(later) = store.list_events(id, range).await else {
            panic!("list failed");
        };
        assert_eq!(later.len(), 2);
    }

    #[tokio::test]
    async fn update_missing_event_is_not_found() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        let result = store
            .apply(
                &owner(),
                WriteOp::UpdateEvent {
                    page_id: id,
                    event_id: EventId::new(),
                    patch: EventPatch::Title("x".into()),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        store.set_available(false);
        assert!(matches!(store.get_page(id).await, Err(StoreError::Unavailable(_))));
        store.set_available(true);
        assert!(matches!(store.get_page(id).await, Ok(Some(_))));
    }

    #[tokio::test]
    async fn owner_listing_is_scoped() {
        let (store, id) = store_with_page("AB3DEFGH9K").await;
        let Ok(mine) = store.list_pages_by_owner(&owner()).await else {
            panic!("list failed");
        };
        assert_eq!(mine.len(), 1);
        assert_eq!(mine.first().map(|p| p.id), Some(id));
        let Ok(theirs) = store.list_pages_by_owner(&OwnerId::new("other")).await else {
            panic!("list failed");
        };
        assert!(theirs.is_empty());
    }
}
