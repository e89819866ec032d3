//! # keepsake-gateway
//!
//! REST API and WebSocket gateway for secret-code memory timelines.
//!
//! An owner builds a page of dated memories; anyone holding the page's
//! ten-character access code can open it and watch the timeline connect as
//! they scroll. The crate keeps an optimistic local view of every page in
//! sync with the document store, orders events by date, and drives the
//! scroll-linked reveal for each viewer.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── PageService, CodeResolver (service/)
//!     ├── ViewerSession, reveal engine (narrative/)
//!     │
//!     ├── DocumentSyncClient: cache, writer, subscriptions (sync/)
//!     │
//!     └── DocumentStore: memory or PostgreSQL (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod narrative;
pub mod service;
pub mod store;
pub mod sync;
pub mod ws;
