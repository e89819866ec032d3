//! Suggestion lookup DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::{Suggestion, SuggestionKind};

/// Request body for `POST /suggestions`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SuggestionRequest {
    /// What to suggest.
    pub kind: SuggestionKind,
    /// Free-text description.
    pub input: String,
}

/// Response body for `POST /suggestions`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuggestionListResponse {
    /// At most five suggestions.
    pub suggestions: Vec<Suggestion>,
}
