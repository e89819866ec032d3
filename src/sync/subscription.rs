//! Live snapshot streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// A live, change-driven stream of snapshots.
///
/// The first item is the state at subscribe time. The stream stays open
/// until [`Subscription::unsubscribe`] is called or the value is dropped;
/// both stop the forwarding task.
#[derive(Debug)]
pub struct Subscription<T> {
    stream: ReceiverStream<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(stream: ReceiverStream<T>, task: JoinHandle<()>) -> Self {
        Self { stream, task }
    }

    /// Waits for the next snapshot. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<T> {
        StreamExt::next(&mut self.stream).await
    }

    /// Tears the subscription down.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the forwarding task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}
