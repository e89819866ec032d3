//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::{GatewayConfig, NarrativeConfig};
use crate::error::KeepsakeError;
use crate::service::{
    CodeResolver, DisabledSuggestions, HttpSuggestionService, PageService, SuggestionService,
};
use crate::store::DocumentStore;
use crate::sync::DocumentSyncClient;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Page service for all business logic.
    pub page_service: Arc<PageService>,
    /// Track and visual suggestions.
    pub suggestions: Arc<dyn SuggestionService>,
    /// Scroll and reveal tuning for viewer sessions.
    pub narrative: NarrativeConfig,
}

impl AppState {
    /// Wires the sync client, resolver and services over `store`.
    ///
    /// Spawns the sync client's writer task, so it must be called inside a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::Internal`] if the suggestion client cannot
    /// be built.
    pub fn new(config: &GatewayConfig, store: Arc<dyn DocumentStore>) -> Result<Self, KeepsakeError> {
        let sync = DocumentSyncClient::new(
            Arc::clone(&store),
            config.write_queue_capacity,
            config.write_queue_capacity,
        );
        let resolver = CodeResolver::new(store);
        let page_service = Arc::new(PageService::new(
            sync,
            resolver,
            config.public_base_url.clone(),
            config.access_code_max_attempts,
        ));

        let suggestions: Arc<dyn SuggestionService> = match &config.suggestion_service_url {
            Some(url) => Arc::new(HttpSuggestionService::new(url.clone(), config.suggestion_timeout)?),
            None => Arc::new(DisabledSuggestions),
        };

        Ok(Self {
            page_service,
            suggestions,
            narrative: config.narrative,
        })
    }
}
