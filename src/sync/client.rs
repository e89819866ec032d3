//! Document sync client: live reads and fire-and-forget writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use super::cache::{LocalCache, PageView};
use super::snapshot::{PageSnapshot, TimelineSnapshot};
use super::subscription::Subscription;
use super::writer::{WriteErrorBus, WriteFailure, WriteRequest, WriterContext, WriterMessage, run_writer};
use crate::domain::{EventId, EventPatch, OwnerId, Page, PageId, PagePatch, StoreChange, TimelineEvent};
use crate::error::KeepsakeError;
use crate::narrative::order_timeline;
use crate::store::{DocumentStore, EventRange, StoreError, WriteOp};

/// Reads of pages nobody follows are retried this many times while
/// confirmations keep landing mid-read.
const STALE_READ_RETRIES: usize = 3;

/// Buffer of each subscription's snapshot channel.
const SNAPSHOT_BUFFER: usize = 32;

/// Handle for an enqueued write.
///
/// The write has not reached the store yet. If it fails, a
/// [`WriteFailure`] with the same `seq` is published on the error bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    /// Issue sequence number.
    pub seq: u64,
    /// Page the write targets.
    pub page_id: PageId,
}

#[derive(Debug)]
struct SyncInner {
    writer: WriterContext,
    queue: mpsc::Sender<WriterMessage>,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

/// Client over a [`DocumentStore`] with a latency-compensated cache.
///
/// Cloning is cheap; clones share the cache, the write queue and the
/// error bus.
#[derive(Debug, Clone)]
pub struct DocumentSyncClient {
    inner: Arc<SyncInner>,
}

impl DocumentSyncClient {
    /// Creates a client and spawns its writer task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, queue_capacity: usize, error_capacity: usize) -> Self {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let (local, _) = broadcast::channel(error_capacity.max(16));
        let writer = WriterContext {
            store,
            cache: Arc::new(RwLock::new(LocalCache::new())),
            local,
            errors: WriteErrorBus::new(error_capacity),
        };
        tokio::spawn(run_writer(writer.clone(), rx));
        Self {
            inner: Arc::new(SyncInner {
                writer,
                queue,
                next_seq: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.writer.store
    }

    /// Subscribes to failures of writes issued through this client.
    #[must_use]
    pub fn write_errors(&self) -> broadcast::Receiver<WriteFailure> {
        self.inner.writer.errors.subscribe()
    }

    // -- reads --

    /// Reads one page, with the owner's pending writes applied.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::PageNotFound`] if the page does not exist
    /// and [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn read_page(&self, page_id: PageId) -> Result<Page, KeepsakeError> {
        let (view, _) = self.load(page_id, false).await?;
        view.page
            .ok_or_else(|| KeepsakeError::PageNotFound(*page_id.as_uuid()))
    }

    /// Reads a page's events in display order.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentSyncClient::read_page`].
    pub async fn read_timeline(&self, page_id: PageId) -> Result<TimelineSnapshot, KeepsakeError> {
        let (view, timeline) = self.load(page_id, true).await?;
        if view.page.is_none() {
            return Err(KeepsakeError::PageNotFound(*page_id.as_uuid()));
        }
        let (events, has_pending_writes) = timeline.unwrap_or_default();
        Ok(TimelineSnapshot {
            page_id,
            events: order_timeline(events),
            has_pending_writes,
        })
    }

    /// Lists an owner's pages, newest first, with pending writes applied.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn pages_for_owner(&self, owner: &OwnerId) -> Result<Vec<Page>, KeepsakeError> {
        let confirmed = self.store().list_pages_by_owner(owner).await?;
        Ok(self.inner.writer.cache.read().await.owner_view(owner, confirmed))
    }

    // -- subscriptions --

    /// Subscribes to a page document.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::PageNotFound`] if the page does not exist
    /// and [`KeepsakeError::Transient`] if the store is unreachable.
    pub async fn subscribe_page(
        &self,
        page_id: PageId,
    ) -> Result<Subscription<PageSnapshot>, KeepsakeError> {
        // Receivers first, so no change between the read and the spawn is lost.
        let store_rx = self.store().changes();
        let local_rx = self.inner.writer.local.subscribe();
        let watch = self.watch(page_id).await;
        self.read_page(page_id).await?;
        let initial = self.page_snapshot(page_id).await;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let client = self.clone();
        let task = tokio::spawn(async move {
            let _watch = watch;
            client.forward_page(page_id, store_rx, local_rx, tx, initial).await;
        });
        tracing::debug!(%page_id, "page subscription opened");
        Ok(Subscription::new(ReceiverStream::new(rx), task))
    }

    /// Subscribes to a page's event collection.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentSyncClient::subscribe_page`].
    pub async fn subscribe_timeline(
        &self,
        page_id: PageId,
    ) -> Result<Subscription<TimelineSnapshot>, KeepsakeError> {
        let store_rx = self.store().changes();
        let local_rx = self.inner.writer.local.subscribe();
        let watch = self.watch(page_id).await;
        let initial = self.read_timeline(page_id).await?;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let client = self.clone();
        let task = tokio::spawn(async move {
            let _watch = watch;
            client.forward_timeline(page_id, store_rx, local_rx, tx, initial).await;
        });
        tracing::debug!(%page_id, "timeline subscription opened");
        Ok(Subscription::new(ReceiverStream::new(rx), task))
    }

    // -- writes --

    /// Enqueues creation of `page`.
    pub async fn create_page(&self, actor: &OwnerId, page: Page) -> WriteTicket {
        self.enqueue(actor, WriteOp::CreatePage(Box::new(page))).await
    }

    /// Enqueues a single-field page write.
    pub async fn update_page(&self, actor: &OwnerId, page_id: PageId, patch: PagePatch) -> WriteTicket {
        self.enqueue(actor, WriteOp::UpdatePage { page_id, patch }).await
    }

    /// Enqueues deletion of a page and its events.
    pub async fn delete_page(&self, actor: &OwnerId, page_id: PageId) -> WriteTicket {
        self.enqueue(actor, WriteOp::DeletePage { page_id }).await
    }

    /// Enqueues creation of `event`.
    pub async fn create_event(&self, actor: &OwnerId, event: TimelineEvent) -> WriteTicket {
        self.enqueue(actor, WriteOp::CreateEvent(Box::new(event))).await
    }

    /// Enqueues a single-field event write.
    pub async fn update_event(
        &self,
        actor: &OwnerId,
        page_id: PageId,
        event_id: EventId,
        patch: EventPatch,
    ) -> WriteTicket {
        self.enqueue(
            actor,
            WriteOp::UpdateEvent {
                page_id,
                event_id,
                patch,
            },
        )
        .await
    }

    /// Enqueues deletion of one event.
    pub async fn delete_event(&self, actor: &OwnerId, page_id: PageId, event_id: EventId) -> WriteTicket {
        self.enqueue(actor, WriteOp::DeleteEvent { page_id, event_id }).await
    }

    /// Waits until every write enqueued before this call has been answered.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.inner.queue.send(WriterMessage::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// Stops accepting writes and waits for queued ones to drain.
    ///
    /// Writes issued afterwards fail on the error bus.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.flush().await;
        tracing::info!("sync client shut down");
    }

    async fn enqueue(&self, actor: &OwnerId, op: WriteOp) -> WriteTicket {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let page_id = op.page_id();
        let ticket = WriteTicket { seq, page_id };

        self.inner
            .writer
            .cache
            .write()
            .await
            .push_pending(seq, actor.clone(), op.clone(), Utc::now());
        let _ = self.inner.writer.local.send(page_id);

        if self.inner.closed.load(Ordering::SeqCst) {
            let err = StoreError::Unavailable("sync client is shut down".into());
            self.inner.writer.fail(seq, actor.clone(), &op, &err).await;
            return ticket;
        }

        let request = WriteRequest {
            seq,
            actor: actor.clone(),
            op,
        };
        if let Err(err) = self.inner.queue.try_send(WriterMessage::Write(request)) {
            let reason = match &err {
                mpsc::error::TrySendError::Full(_) => "write queue is full",
                mpsc::error::TrySendError::Closed(_) => "write queue is closed",
            };
            if let WriterMessage::Write(request) = err.into_inner() {
                let err = StoreError::Unavailable(reason.into());
                self.inner
                    .writer
                    .fail(request.seq, request.actor, &request.op, &err)
                    .await;
            }
        } else {
            tracing::trace!(seq, %page_id, "write enqueued");
        }
        ticket
    }

    // -- cache plumbing --

    async fn watch(&self, page_id: PageId) -> WatchGuard {
        let cache = &self.inner.writer.cache;
        cache.write().await.watch(page_id);
        WatchGuard {
            cache: Arc::clone(cache),
            page_id,
        }
    }

    /// Reads a page, and its events when `with_events` is set, and returns
    /// the views with pending writes applied. Followed pages are refreshed
    /// in the cache on the way.
    async fn load(&self, page_id: PageId, with_events: bool) -> Result<Loaded, StoreError> {
        let cache = &self.inner.writer.cache;
        let mut attempt = 1;
        loop {
            let read_at = cache.read().await.clock();
            let page = self.store().get_page(page_id).await?;
            let events = if with_events && page.is_some() {
                match self.store().list_events(page_id, EventRange::all()).await {
                    Ok(events) => events,
                    Err(StoreError::PageNotFound(_)) => Vec::new(),
                    Err(err) => return Err(err),
                }
            } else {
                Vec::new()
            };

            let mut guard = cache.write().await;
            let mut current = guard.absorb_page(page_id, page.clone(), read_at);
            if with_events {
                current &= guard.absorb_events(page_id, events.clone(), read_at);
            }
            if current || attempt >= STALE_READ_RETRIES {
                let view = guard.page_view(page_id, page.clone());
                let timeline = with_events.then(|| guard.events_view(page_id, page, events));
                return Ok((view, timeline));
            }
            attempt += 1;
        }
    }

    async fn page_snapshot(&self, page_id: PageId) -> PageSnapshot {
        let view = self.inner.writer.cache.read().await.page_view(page_id, None);
        match view.page {
            Some(page) => PageSnapshot::Present {
                page,
                has_pending_writes: view.has_pending_writes,
            },
            None => PageSnapshot::Deleted { page_id },
        }
    }

    async fn timeline_snapshot(&self, page_id: PageId) -> TimelineSnapshot {
        let (events, has_pending_writes) =
            self.inner
                .writer
                .cache
                .read()
                .await
                .events_view(page_id, None, Vec::new());
        TimelineSnapshot {
            page_id,
            events: order_timeline(events),
            has_pending_writes,
        }
    }

    async fn forward_page(
        &self,
        page_id: PageId,
        mut store_rx: broadcast::Receiver<StoreChange>,
        mut local_rx: broadcast::Receiver<PageId>,
        tx: mpsc::Sender<PageSnapshot>,
        initial: PageSnapshot,
    ) {
        let mut last = initial.clone();
        if tx.send(initial).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                change = store_rx.recv() => match change {
                    Ok(change) if change.page_id() == page_id && change.touches_page() => {
                        self.refresh_logged(page_id, false).await;
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%page_id, skipped, "page subscription lagged, re-reading");
                        self.refresh_logged(page_id, false).await;
                    }
                    Err(RecvError::Closed) => break,
                },
                local = local_rx.recv() => match local {
                    Ok(id) if id == page_id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                () = tx.closed() => break,
            }

            let snapshot = self.page_snapshot(page_id).await;
            if snapshot == last {
                continue;
            }
            let deleted = matches!(snapshot, PageSnapshot::Deleted { .. });
            if tx.send(snapshot.clone()).await.is_err() || deleted {
                break;
            }
            last = snapshot;
        }
        tracing::debug!(%page_id, "page subscription closed");
    }

    async fn forward_timeline(
        &self,
        page_id: PageId,
        mut store_rx: broadcast::Receiver<StoreChange>,
        mut local_rx: broadcast::Receiver<PageId>,
        tx: mpsc::Sender<TimelineSnapshot>,
        initial: TimelineSnapshot,
    ) {
        let mut last = initial.clone();
        if tx.send(initial).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                change = store_rx.recv() => match change {
                    Ok(change) if change.page_id() == page_id && change.touches_events() => {
                        self.refresh_logged(page_id, true).await;
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%page_id, skipped, "timeline subscription lagged, re-reading");
                        self.refresh_logged(page_id, true).await;
                    }
                    Err(RecvError::Closed) => break,
                },
                local = local_rx.recv() => match local {
                    Ok(id) if id == page_id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                () = tx.closed() => break,
            }

            let snapshot = self.timeline_snapshot(page_id).await;
            if snapshot == last {
                continue;
            }
            if tx.send(snapshot.clone()).await.is_err() {
                break;
            }
            last = snapshot;
        }
        tracing::debug!(%page_id, "timeline subscription closed");
    }

    /// Re-reads after a change notification. Failures keep the cached
    /// state; the next notification tries again.
    async fn refresh_logged(&self, page_id: PageId, events: bool) {
        if let Err(err) = self.load(page_id, events).await {
            tracing::warn!(%page_id, error = %err, "refresh after change failed");
        }
    }
}

/// Page view plus, when requested, the event view.
type Loaded = (PageView, Option<(Vec<TimelineEvent>, bool)>);

/// Keeps a followed page cached while its forwarding task lives.
#[derive(Debug)]
struct WatchGuard {
    cache: Arc<RwLock<LocalCache>>,
    page_id: PageId,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let page_id = self.page_id;
        if let Ok(mut cache) = self.cache.try_write() {
            cache.unwatch(page_id);
            return;
        }
        let cache = Arc::clone(&self.cache);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                cache.write().await.unwatch(page_id);
            });
        }
    }
}
