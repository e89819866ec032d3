//! Data Transfer Objects for REST request/response serialization.
//!
//! Identifiers are plain UUIDs on the wire. Owner identity never appears in
//! the public viewer DTOs.

pub mod common_dto;
pub mod event_dto;
pub mod page_dto;
pub mod suggestion_dto;
pub mod viewer_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use page_dto::*;
pub use suggestion_dto::*;
pub use viewer_dto::*;
