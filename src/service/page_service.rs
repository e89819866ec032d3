//! Page service: the owner dashboard and the public viewer on top of the
//! sync client.

use chrono::Utc;

use super::code_resolver::CodeResolver;
use crate::domain::{
    AccessCode, EventId, EventPatch, NewPage, OwnerId, Page, PageId, PagePatch, TimelineEvent,
    public_path, public_url,
};
use crate::error::KeepsakeError;
use crate::narrative::{RenderPlan, RenderStrategy};
use crate::sync::{DocumentSyncClient, TimelineSnapshot, WriteTicket};

/// Result of creating a page.
#[derive(Debug, Clone)]
pub struct CreatedPage {
    /// The page as enqueued.
    pub page: Page,
    /// Cosmetic slug derived from the recipient name.
    pub slug: String,
    /// Relative public path.
    pub public_path: String,
    /// Absolute public URL.
    pub public_url: String,
    /// Ticket of the creation write.
    pub ticket: WriteTicket,
}

/// Everything the owner's editor shows for one page.
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// The page.
    pub page: Page,
    /// Ordered events.
    pub timeline: TimelineSnapshot,
    /// Relative public path.
    pub public_path: String,
    /// Absolute public URL.
    pub public_url: String,
}

/// Everything a code holder sees.
#[derive(Debug, Clone)]
pub struct PublicView {
    /// The page.
    pub page: Page,
    /// Ordered events.
    pub timeline: TimelineSnapshot,
    /// Cards for the page's layout.
    pub plan: RenderPlan,
}

/// Orchestrates page and event operations.
///
/// Reads go through the sync client and surface errors synchronously.
/// Writes are enqueued and return a [`WriteTicket`]; their failures arrive
/// on the client's write-error bus.
#[derive(Debug, Clone)]
pub struct PageService {
    sync: DocumentSyncClient,
    resolver: CodeResolver,
    public_base_url: String,
    code_attempts: u32,
}

impl PageService {
    /// Creates a new `PageService`.
    #[must_use]
    pub fn new(
        sync: DocumentSyncClient,
        resolver: CodeResolver,
        public_base_url: impl Into<String>,
        code_attempts: u32,
    ) -> Self {
        Self {
            sync,
            resolver,
            public_base_url: public_base_url.into(),
            code_attempts: code_attempts.max(1),
        }
    }

    /// Returns the inner sync client.
    #[must_use]
    pub const fn sync(&self) -> &DocumentSyncClient {
        &self.sync
    }

    /// Returns the inner code resolver.
    #[must_use]
    pub const fn resolver(&self) -> &CodeResolver {
        &self.resolver
    }

    /// Creates a page with a fresh access code.
    ///
    /// The code is checked against the store and regenerated on collision.
    /// The page itself is written fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Transient`] if the uniqueness check cannot
    /// reach the store and [`KeepsakeError::Internal`] if every attempt
    /// collided.
    pub async fn create_page(
        &self,
        owner: &OwnerId,
        draft: NewPage,
    ) -> Result<CreatedPage, KeepsakeError> {
        let access_code = self.unused_access_code().await?;
        let page = Page::new(PageId::new(), owner.clone(), access_code, draft, Utc::now());
        let slug = page.slug();
        let path = public_path(&slug, &page.access_code);
        let url = public_url(&self.public_base_url, &path);

        let ticket = self.sync.create_page(owner, page.clone()).await;
        tracing::info!(page_id = %page.id, %owner, "page created");
        Ok(CreatedPage {
            page,
            slug,
            public_path: path,
            public_url: url,
            ticket,
        })
    }

    /// Lists the owner's pages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn list_pages(&self, owner: &OwnerId) -> Result<Vec<Page>, KeepsakeError> {
        self.sync.pages_for_owner(owner).await
    }

    /// Loads the editor view of a page.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::PageNotFound`] if the page does not exist,
    /// [`KeepsakeError::Unauthorized`] if `owner` does not own it, and
    /// [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn dashboard(
        &self,
        owner: &OwnerId,
        page_id: PageId,
    ) -> Result<Dashboard, KeepsakeError> {
        let page = self.owned_page(owner, page_id).await?;
        let timeline = self.sync.read_timeline(page_id).await?;
        let path = public_path(&page.slug(), &page.access_code);
        let url = public_url(&self.public_base_url, &path);
        Ok(Dashboard {
            page,
            timeline,
            public_path: path,
            public_url: url,
        })
    }

    /// Checks that `owner` owns `page_id` and returns the page.
    ///
    /// # Errors
    ///
    /// Same as [`PageService::dashboard`].
    pub async fn owned_page(&self, owner: &OwnerId, page_id: PageId) -> Result<Page, KeepsakeError> {
        let page = self.sync.read_page(page_id).await?;
        if &page.owner != owner {
            tracing::warn!(%page_id, %owner, "page opened by a non-owner");
            return Err(KeepsakeError::Unauthorized(format!(
                "page {page_id} belongs to another owner"
            )));
        }
        Ok(page)
    }

    /// Enqueues a page field write.
    pub async fn update_page(&self, owner: &OwnerId, page_id: PageId, patch: PagePatch) -> WriteTicket {
        tracing::debug!(%page_id, field = patch.field(), "page field write");
        self.sync.update_page(owner, page_id, patch).await
    }

    /// Enqueues deletion of a page and its events.
    pub async fn delete_page(&self, owner: &OwnerId, page_id: PageId) -> WriteTicket {
        tracing::info!(%page_id, %owner, "page deletion requested");
        self.sync.delete_page(owner, page_id).await
    }

    /// Enqueues a placeholder event at the end of the page's order.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Unauthorized`] if `owner` does not own the
    /// page, and [`KeepsakeError::PageNotFound`] or
    /// [`KeepsakeError::Transient`] if the page's events cannot be read.
    pub async fn add_event(
        &self,
        owner: &OwnerId,
        page_id: PageId,
    ) -> Result<(EventId, WriteTicket), KeepsakeError> {
        self.owned_page(owner, page_id).await?;
        let timeline = self.sync.read_timeline(page_id).await?;
        let order = i64::try_from(timeline.events.len()).unwrap_or(i64::MAX);
        let now = Utc::now();
        let event = TimelineEvent::placeholder(EventId::new(), page_id, order, now.date_naive(), now);
        let event_id = event.id;
        let ticket = self.sync.create_event(owner, event).await;
        tracing::debug!(%page_id, %event_id, order, "event added");
        Ok((event_id, ticket))
    }

    /// Enqueues an event field write.
    pub async fn update_event(
        &self,
        owner: &OwnerId,
        page_id: PageId,
        event_id: EventId,
        patch: EventPatch,
    ) -> WriteTicket {
        self.sync.update_event(owner, page_id, event_id, patch).await
    }

    /// Enqueues deletion of one event.
    pub async fn delete_event(&self, owner: &OwnerId, page_id: PageId, event_id: EventId) -> WriteTicket {
        self.sync.delete_event(owner, page_id, event_id).await
    }

    /// Loads the public view for an access code.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::CodeNotFound`] if no page matches,
    /// including when the page was deleted between resolution and read, and
    /// [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn view_by_code(&self, code: &str) -> Result<PublicView, KeepsakeError> {
        let page_id = self.resolver.resolve(code).await?;
        self.public_view(page_id).await
    }

    /// Loads the public view for a `/surprise/{slug}/{code}` link. A slug
    /// that no longer matches the recipient still opens the page.
    ///
    /// # Errors
    ///
    /// Same as [`PageService::view_by_code`].
    pub async fn view_by_link(&self, slug: &str, code: &str) -> Result<PublicView, KeepsakeError> {
        let page_id = self.resolver.resolve_with_slug(slug, code).await?;
        self.public_view(page_id).await
    }

    async fn public_view(&self, page_id: PageId) -> Result<PublicView, KeepsakeError> {
        let hide_missing = |err: KeepsakeError| match err {
            KeepsakeError::PageNotFound(_) => KeepsakeError::CodeNotFound,
            other => other,
        };
        let page = self.sync.read_page(page_id).await.map_err(hide_missing)?;
        let timeline = self.sync.read_timeline(page_id).await.map_err(hide_missing)?;
        let plan = RenderStrategy::for_layout(page.layout).plan(&timeline.events);
        Ok(PublicView {
            page,
            timeline,
            plan,
        })
    }

    async fn unused_access_code(&self) -> Result<AccessCode, KeepsakeError> {
        for attempt in 1..=self.code_attempts {
            let code = AccessCode::random();
            let taken = self
                .sync
                .store()
                .find_pages_by_access_code(code.as_str())
                .await?;
            if taken.is_empty() {
                return Ok(code);
            }
            tracing::warn!(attempt, "generated access code already in use, retrying");
        }
        Err(KeepsakeError::Internal(format!(
            "no unused access code after {} attempts",
            self.code_attempts
        )))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::LayoutVariant;
    use crate::store::{DocumentStore, MemoryStore};

    fn service(store: Arc<MemoryStore>) -> PageService {
        let dyn_store: Arc<dyn DocumentStore> = store;
        let sync = DocumentSyncClient::new(Arc::clone(&dyn_store), 64, 64);
        PageService::new(sync, CodeResolver::new(dyn_store), "https://keepsake.test", 5)
    }

    fn owner() -> OwnerId {
        OwnerId::new("owner-1")
    }

    fn sarah() -> NewPage {
        NewPage {
            recipient_name: Some("Sarah Jones".into()),
            ..NewPage::default()
        }
    }

    #[tokio::test]
    async fn created_page_links_resolve_to_the_dashboard_page() {
        let svc = service(Arc::new(MemoryStore::default()));
        let Ok(created) = svc.create_page(&owner(), sarah()).await else {
            panic!("create failed");
        };
        assert_eq!(created.slug, "sarah-jones");
        assert_eq!(
            created.public_path,
            format!("/surprise/sarah-jones/{}", created.page.access_code)
        );
        assert!(created.public_url.starts_with("https://keepsake.test/surprise/"));

        svc.sync().flush().await;
        let Ok(dashboard) = svc.dashboard(&owner(), created.page.id).await else {
            panic!("dashboard failed");
        };
        let Ok(view) = svc.view_by_code(created.page.access_code.as_str()).await else {
            panic!("view failed");
        };
        assert_eq!(view.page.id, dashboard.page.id);
    }

    #[tokio::test]
    async fn dashboard_rejects_other_owners() {
        let svc = service(Arc::new(MemoryStore::default()));
        let Ok(created) = svc.create_page(&owner(), NewPage::default()).await else {
            panic!("create failed");
        };
        let result = svc.dashboard(&OwnerId::new("stranger"), created.page.id).await;
        assert!(matches!(result, Err(KeepsakeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn added_events_get_increasing_order_hints() {
        let svc = service(Arc::new(MemoryStore::default()));
        let Ok(created) = svc.create_page(&owner(), NewPage::default()).await else {
            panic!("create failed");
        };
        let page_id = created.page.id;
        for _ in 0..3 {
            let added = svc.add_event(&owner(), page_id).await;
            assert!(added.is_ok());
        }
        svc.sync().flush().await;
        let Ok(dashboard) = svc.dashboard(&owner(), page_id).await else {
            panic!("dashboard failed");
        };
        let hints: Vec<i64> = dashboard.timeline.events.iter().map(|e| e.order).collect();
        assert_eq!(hints, vec![0, 1, 2]);
        assert!(dashboard.timeline.events.iter().all(|e| e.title == "New Memory"));
    }

    #[tokio::test]
    async fn strangers_cannot_add_events() {
        let svc = service(Arc::new(MemoryStore::default()));
        let Ok(created) = svc.create_page(&owner(), NewPage::default()).await else {
            panic!("create failed");
        };
        let page_id = created.page.id;
        let added = svc.add_event(&OwnerId::new("stranger"), page_id).await;
        assert!(matches!(added, Err(KeepsakeError::Unauthorized(_))));

        svc.sync().flush().await;
        let Ok(dashboard) = svc.dashboard(&owner(), page_id).await else {
            panic!("dashboard failed");
        };
        assert!(dashboard.timeline.events.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_page_makes_its_code_not_found() {
        let svc = service(Arc::new(MemoryStore::default()));
        let Ok(created) = svc.create_page(&owner(), NewPage::default()).await else {
            panic!("create failed");
        };
        let code = created.page.access_code.to_string();
        svc.sync().flush().await;
        assert!(svc.view_by_code(&code).await.is_ok());

        let _ = svc.delete_page(&owner(), created.page.id).await;
        svc.sync().flush().await;
        assert!(matches!(
            svc.view_by_code(&code).await,
            Err(KeepsakeError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn public_view_plan_follows_layout() {
        let svc = service(Arc::new(MemoryStore::default()));
        let draft = NewPage {
            layout: Some(LayoutVariant::Grid),
            ..NewPage::default()
        };
        let Ok(created) = svc.create_page(&owner(), draft).await else {
            panic!("create failed");
        };
        let _ = svc.add_event(&owner(), created.page.id).await;
        svc.sync().flush().await;
        let Ok(view) = svc.view_by_code(created.page.access_code.as_str()).await else {
            panic!("view failed");
        };
        assert_eq!(view.plan.strategy, RenderStrategy::Grid);
        assert_eq!(view.plan.cards.len(), 1);
        assert!(view.plan.cards.iter().all(|c| c.reveal_at.is_none()));
    }

    #[tokio::test]
    async fn create_fails_transiently_when_store_is_down() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(Arc::clone(&store));
        store.set_available(false);
        let result = svc.create_page(&owner(), NewPage::default()).await;
        assert!(matches!(result, Err(KeepsakeError::Transient(_))));
    }
}
