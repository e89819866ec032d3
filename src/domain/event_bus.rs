//! Broadcast channel for store change notifications.
//!
//! [`ChangeBus`] wraps a [`tokio::sync::broadcast`] channel. Every write the
//! store applies publishes a [`StoreChange`] through the bus, and every
//! live subscription on the sync client holds a receiver.

use tokio::sync::broadcast;

use super::StoreChange;

/// Broadcast bus for [`StoreChange`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest notifications
/// are dropped for lagging receivers; receivers recover by re-reading.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeBus {
    /// Creates a new `ChangeBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a change to all subscribers.
    ///
    /// Returns the number of receivers that received the change.
    /// If there are no active receivers, the change is silently dropped.
    pub fn publish(&self, change: StoreChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::PageId;
    use chrono::Utc;

    fn make_change(page_id: PageId) -> StoreChange {
        StoreChange::PageUpdated {
            page_id,
            field: "title",
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = ChangeBus::new(100);
        assert_eq!(bus.publish(make_change(PageId::new())), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_change() {
        let bus = ChangeBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = PageId::new();
        assert_eq!(bus.publish(make_change(id)), 2);

        let Ok(c1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(c2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(c1.page_id(), id);
        assert_eq!(c2.page_id(), id);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = ChangeBus::new(100);
        assert_eq!(bus.receiver_count(), 0);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);
        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let bus = ChangeBus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.publish(make_change(PageId::new())), 1);
    }
}
