//! Per-connection subscription manager.
//!
//! A connection follows at most one page at a time: its page stream, its
//! timeline stream and the viewer session fed by both. Following a new page
//! tears the previous streams down.

use std::future::pending;

use crate::domain::PageId;
use crate::narrative::ViewerSession;
use crate::sync::{PageSnapshot, Subscription, TimelineSnapshot};

/// How the followed page was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Owner live preview, opened by page id.
    Owner,
    /// Public viewer, opened by access code.
    Viewer,
}

/// The page a connection currently follows.
#[derive(Debug)]
pub struct Followed {
    /// How it was opened.
    pub mode: FollowMode,
    /// Page document stream.
    pub page: Subscription<PageSnapshot>,
    /// Event collection stream.
    pub timeline: Subscription<TimelineSnapshot>,
    /// Reveal context for this viewer.
    pub session: ViewerSession,
}

/// Manages the followed page for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    followed: Option<Followed>,
}

impl SubscriptionManager {
    /// Creates a manager that follows nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts following a page, replacing whatever was followed before.
    /// Returns the page that was dropped, if any.
    pub fn follow(&mut self, followed: Followed) -> Option<PageId> {
        let previous = self.unfollow();
        self.followed = Some(followed);
        previous
    }

    /// Stops following. Dropping the subscriptions stops their tasks.
    pub fn unfollow(&mut self) -> Option<PageId> {
        self.followed.take().map(|f| f.session.page_id())
    }

    /// Page currently followed.
    #[must_use]
    pub fn page_id(&self) -> Option<PageId> {
        self.followed.as_ref().map(|f| f.session.page_id())
    }

    /// Mutable access to the followed page's session.
    pub fn session_mut(&mut self) -> Option<&mut ViewerSession> {
        self.followed.as_mut().map(|f| &mut f.session)
    }

    /// Whether the followed page was opened by its owner.
    #[must_use]
    pub fn is_owner_view(&self) -> bool {
        self.followed
            .as_ref()
            .is_some_and(|f| f.mode == FollowMode::Owner)
    }

    /// Both snapshot streams of the followed page, borrowed together so a
    /// connection loop can wait on either.
    pub fn streams(
        &mut self,
    ) -> (
        Option<&mut Subscription<PageSnapshot>>,
        Option<&mut Subscription<TimelineSnapshot>>,
    ) {
        match self.followed.as_mut() {
            Some(f) => (Some(&mut f.page), Some(&mut f.timeline)),
            None => (None, None),
        }
    }
}

/// Next item of `sub`. Never resolves when there is no subscription.
pub async fn next_or_pending<T>(sub: Option<&mut Subscription<T>>) -> Option<T> {
    match sub {
        Some(sub) => sub.next().await,
        None => pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::domain::LayoutVariant;
    use crate::narrative::{RevealPolicy, ScrollProgressEngine};

    fn subscription<T: Send + 'static>() -> (mpsc::Sender<T>, Subscription<T>) {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(std::future::pending::<()>());
        (tx, Subscription::new(ReceiverStream::new(rx), task))
    }

    fn followed(mode: FollowMode, page_id: PageId) -> Followed {
        let (_, page) = subscription();
        let (_, timeline) = subscription();
        Followed {
            mode,
            page,
            timeline,
            session: ViewerSession::new(
                page_id,
                LayoutVariant::Linear,
                ScrollProgressEngine::default(),
                RevealPolicy::default(),
            ),
        }
    }

    #[tokio::test]
    async fn following_replaces_the_previous_page() {
        let mut mgr = SubscriptionManager::new();
        assert!(mgr.page_id().is_none());

        let first = PageId::new();
        let second = PageId::new();
        assert_eq!(mgr.follow(followed(FollowMode::Viewer, first)), None);
        assert!(!mgr.is_owner_view());
        assert_eq!(mgr.follow(followed(FollowMode::Owner, second)), Some(first));
        assert_eq!(mgr.page_id(), Some(second));
        assert!(mgr.is_owner_view());

        assert_eq!(mgr.unfollow(), Some(second));
        assert!(mgr.session_mut().is_none());
    }

    #[tokio::test]
    async fn streams_yield_from_the_followed_page() {
        let mut mgr = SubscriptionManager::new();
        let page_id = PageId::new();
        let (tx, page) = subscription();
        let (_, timeline) = subscription();
        mgr.follow(Followed {
            mode: FollowMode::Viewer,
            page,
            timeline,
            session: ViewerSession::new(
                page_id,
                LayoutVariant::Grid,
                ScrollProgressEngine::default(),
                RevealPolicy::default(),
            ),
        });

        let Ok(()) = tx.send(PageSnapshot::Deleted { page_id }).await else {
            panic!("receiver alive");
        };
        let (page_stream, _) = mgr.streams();
        assert_eq!(
            next_or_pending(page_stream).await,
            Some(PageSnapshot::Deleted { page_id })
        );
    }

    #[tokio::test]
    async fn nothing_followed_never_resolves() {
        let mut mgr = SubscriptionManager::new();
        let (page_stream, _) = mgr.streams();
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(20), next_or_pending(page_stream))
                .await;
        assert!(waited.is_err());
    }
}
