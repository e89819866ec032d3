//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` carries the owner's live preview and the
//! public viewer: page and timeline snapshots, reveal state driven by
//! scroll samples and intersection readings, and write failures for the
//! connection's owner.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
