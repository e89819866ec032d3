//! Client-side document sync.
//!
//! [`DocumentSyncClient`] sits between callers and a
//! [`crate::store::DocumentStore`]. Reads overlay unconfirmed writes made by
//! the page's owner, and followed pages stay cached while subscribed. Writes
//! are enqueued to a single writer task and return at once. Failures arrive
//! on the [`WriteErrorBus`].

mod cache;
mod client;
mod snapshot;
mod subscription;
mod writer;

pub use cache::{LocalCache, PageView};
pub use client::{DocumentSyncClient, WriteTicket};
pub use snapshot::{PageSnapshot, TimelineSnapshot};
pub use subscription::Subscription;
pub use writer::{FailureReason, WriteErrorBus, WriteFailure};
