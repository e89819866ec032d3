//! Background writer and the write-error bus.
//!
//! Every mutation issued through [`super::DocumentSyncClient`] is pushed onto
//! a bounded queue and applied by a single task in FIFO order. The caller has
//! already returned by the time the store answers, so failures are reported
//! on the [`WriteErrorBus`] and the optimistic state is rolled back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use super::cache::LocalCache;
use crate::domain::{OwnerId, PageId};
use crate::store::{DocumentStore, StoreError, WriteOp};

/// Why a queued write did not reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The actor does not own the target page.
    PermissionDenied,
    /// The target page or event no longer exists.
    NotFound,
    /// The store could not be reached, or the write queue was full.
    Unavailable,
    /// The store rejected the write.
    Rejected,
}

impl From<&StoreError> for FailureReason {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(_) => Self::PermissionDenied,
            StoreError::PageNotFound(_) | StoreError::EventNotFound(_) => Self::NotFound,
            StoreError::Unavailable(_) => Self::Unavailable,
            StoreError::Backend(_) => Self::Rejected,
        }
    }
}

/// Notice published when a fire-and-forget write fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    /// Sequence number from the [`super::WriteTicket`] of the failed write.
    pub seq: u64,
    /// Identity that issued the write.
    pub actor: OwnerId,
    /// Page the write targeted.
    pub page_id: PageId,
    /// Operation name, e.g. `update_event`.
    pub operation: &'static str,
    /// Failure category.
    pub reason: FailureReason,
    /// Store message.
    pub message: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl WriteFailure {
    pub(crate) fn new(seq: u64, actor: OwnerId, op: &WriteOp, err: &StoreError) -> Self {
        Self {
            seq,
            actor,
            page_id: op.page_id(),
            operation: op.kind(),
            reason: FailureReason::from(err),
            message: err.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for [`WriteFailure`]s.
#[derive(Debug, Clone)]
pub struct WriteErrorBus {
    sender: broadcast::Sender<WriteFailure>,
}

impl WriteErrorBus {
    /// Creates a bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a failure. Dropped silently when nobody listens.
    pub fn publish(&self, failure: WriteFailure) -> usize {
        self.sender.send(failure).unwrap_or(0)
    }

    /// Subscribes to all future failures.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WriteFailure> {
        self.sender.subscribe()
    }
}

/// One queued write.
#[derive(Debug)]
pub(crate) struct WriteRequest {
    pub seq: u64,
    pub actor: OwnerId,
    pub op: WriteOp,
}

#[derive(Debug)]
pub(crate) enum WriterMessage {
    Write(WriteRequest),
    /// Answered once every write queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Handles shared between the client and its writer task.
#[derive(Debug, Clone)]
pub(crate) struct WriterContext {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<RwLock<LocalCache>>,
    pub local: broadcast::Sender<PageId>,
    pub errors: WriteErrorBus,
}

impl WriterContext {
    /// Rolls back a write that never reached the store and reports it.
    pub(crate) async fn fail(&self, seq: u64, actor: OwnerId, op: &WriteOp, err: &StoreError) {
        self.cache.write().await.reject(seq);
        tracing::warn!(
            seq,
            page_id = %op.page_id(),
            operation = op.kind(),
            actor = %actor,
            error = %err,
            "write failed, optimistic state rolled back"
        );
        self.errors.publish(WriteFailure::new(seq, actor, op, err));
        let _ = self.local.send(op.page_id());
    }
}

/// Drains the write queue until every sender is gone.
pub(crate) async fn run_writer(ctx: WriterContext, mut rx: mpsc::Receiver<WriterMessage>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMessage::Flush(done) => {
                let _ = done.send(());
            }
            WriterMessage::Write(WriteRequest { seq, actor, op }) => {
                let page_id = op.page_id();
                let kind = op.kind();
                match ctx.store.apply(&actor, op.clone()).await {
                    Ok(()) => {
                        ctx.cache.write().await.confirm(seq);
                        tracing::debug!(seq, %page_id, operation = kind, "write confirmed");
                        let _ = ctx.local.send(page_id);
                    }
                    Err(err) => ctx.fail(seq, actor, &op, &err).await,
                }
            }
        }
    }
    tracing::debug!("write queue closed, writer stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_reasons() {
        assert_eq!(
            FailureReason::from(&StoreError::PermissionDenied("x".into())),
            FailureReason::PermissionDenied
        );
        assert_eq!(
            FailureReason::from(&StoreError::PageNotFound(PageId::new())),
            FailureReason::NotFound
        );
        assert_eq!(
            FailureReason::from(&StoreError::Unavailable("down".into())),
            FailureReason::Unavailable
        );
        assert_eq!(
            FailureReason::from(&StoreError::Backend("bad".into())),
            FailureReason::Rejected
        );
    }

    #[test]
    fn failure_carries_operation_and_page() {
        let page_id = PageId::new();
        let op = WriteOp::DeletePage { page_id };
        let err = StoreError::PermissionDenied("not yours".into());
        let failure = WriteFailure::new(3, OwnerId::new("intruder"), &op, &err);
        assert_eq!(failure.page_id, page_id);
        assert_eq!(failure.operation, "delete_page");
        assert_eq!(failure.seq, 3);
        assert!(failure.message.contains("not yours"));
    }

    #[tokio::test]
    async fn bus_without_listeners_drops_silently() {
        let bus = WriteErrorBus::new(4);
        let op = WriteOp::DeletePage {
            page_id: PageId::new(),
        };
        let err = StoreError::Unavailable("down".into());
        assert_eq!(bus.publish(WriteFailure::new(1, OwnerId::new("a"), &op, &err)), 0);
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(WriteFailure::new(2, OwnerId::new("a"), &op, &err)), 1);
        let Ok(got) = rx.recv().await else {
            panic!("failure not delivered");
        };
        assert_eq!(got.seq, 2);
    }
}
