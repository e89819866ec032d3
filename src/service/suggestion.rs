//! Track and visual suggestions from an external service.
//!
//! Suggestions are best-effort enrichment for the editor. Nothing else in
//! the crate depends on them, and a missing or failing service only ever
//! produces an empty list or a transient error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::KeepsakeError;

/// Upper bound on suggestions returned to a caller.
pub const MAX_SUGGESTIONS: usize = 5;

/// What to suggest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Soundtrack candidates.
    Track,
    /// Visual or theme candidates.
    Visual,
}

/// One structured suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Suggestion {
    /// Display title.
    pub title: String,
    /// Secondary line, e.g. the artist.
    #[serde(default)]
    pub detail: Option<String>,
    /// Opaque reference the editor can store on the page.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Source of suggestions.
#[async_trait]
pub trait SuggestionService: Send + Sync + std::fmt::Debug {
    /// Returns at most [`MAX_SUGGESTIONS`] suggestions for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::InvalidRequest`] for blank input and
    /// [`KeepsakeError::Transient`] when the service cannot be reached.
    async fn suggest(
        &self,
        kind: SuggestionKind,
        input: &str,
    ) -> Result<Vec<Suggestion>, KeepsakeError>;
}

/// Used when no suggestion service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSuggestions;

#[async_trait]
impl SuggestionService for DisabledSuggestions {
    async fn suggest(
        &self,
        _kind: SuggestionKind,
        input: &str,
    ) -> Result<Vec<Suggestion>, KeepsakeError> {
        validate_input(input)?;
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

/// JSON-over-HTTP suggestion backend.
///
/// Sends `POST {endpoint}` with `{"kind", "input"}` and expects
/// `{"suggestions": [...]}` back.
#[derive(Debug, Clone)]
pub struct HttpSuggestionService {
    client: Client,
    endpoint: String,
}

impl HttpSuggestionService {
    /// Builds a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Internal`] if the HTTP client cannot be
    /// built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, KeepsakeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeepsakeError::Internal(format!("suggestion client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SuggestionService for HttpSuggestionService {
    async fn suggest(
        &self,
        kind: SuggestionKind,
        input: &str,
    ) -> Result<Vec<Suggestion>, KeepsakeError> {
        let input = validate_input(input)?;
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "kind": kind, "input": input }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::warn!(error = %e, "suggestion service unreachable");
                KeepsakeError::Transient(format!("suggestion service: {e}"))
            })?;

        let body: SuggestionResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "suggestion service returned an unreadable body");
            KeepsakeError::Transient(format!("suggestion service: {e}"))
        })?;

        let mut suggestions = body.suggestions;
        suggestions.truncate(MAX_SUGGESTIONS);
        tracing::debug!(count = suggestions.len(), ?kind, "suggestions fetched");
        Ok(suggestions)
    }
}

fn validate_input(input: &str) -> Result<&str, KeepsakeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KeepsakeError::InvalidRequest(
            "suggestion input must not be blank".into(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    async fn serve(router: Router) -> String {
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/suggest")
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let result = DisabledSuggestions.suggest(SuggestionKind::Track, "   ").await;
        assert!(matches!(result, Err(KeepsakeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn disabled_service_returns_nothing() {
        let result = DisabledSuggestions.suggest(SuggestionKind::Visual, "beach").await;
        assert!(matches!(result, Ok(v) if v.is_empty()));
    }

    #[tokio::test]
    async fn http_results_are_capped() {
        let router = Router::new().route(
            "/suggest",
            post(|| async {
                let suggestions: Vec<Suggestion> = (0..8)
                    .map(|i| Suggestion {
                        title: format!("Song {i}"),
                        detail: None,
                        reference: None,
                    })
                    .collect();
                Json(json!({ "suggestions": suggestions }))
            }),
        );
        let endpoint = serve(router).await;
        let Ok(service) = HttpSuggestionService::new(endpoint, Duration::from_secs(5)) else {
            panic!("client build failed");
        };
        let Ok(got) = service.suggest(SuggestionKind::Track, "first dance").await else {
            panic!("suggest failed");
        };
        assert_eq!(got.len(), MAX_SUGGESTIONS);
        assert_eq!(got.first().map(|s| s.title.as_str()), Some("Song 0"));
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let Ok(service) =
            HttpSuggestionService::new("http://127.0.0.1:9/suggest", Duration::from_secs(2))
        else {
            panic!("client build failed");
        };
        let result = service.suggest(SuggestionKind::Track, "anything").await;
        assert!(matches!(result, Err(KeepsakeError::Transient(_))));
    }
}
