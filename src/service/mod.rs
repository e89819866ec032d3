//! Service layer: business logic orchestration.
//!
//! [`PageService`] drives the owner dashboard and the public viewer through
//! the sync client, [`CodeResolver`] maps access codes to pages, and
//! [`SuggestionService`] fronts the optional suggestion backend.

pub mod code_resolver;
pub mod page_service;
pub mod suggestion;

pub use code_resolver::CodeResolver;
pub use page_service::{CreatedPage, Dashboard, PageService, PublicView};
pub use suggestion::{
    DisabledSuggestions, HttpSuggestionService, MAX_SUGGESTIONS, Suggestion, SuggestionKind,
    SuggestionService,
};
