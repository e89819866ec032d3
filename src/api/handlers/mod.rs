//! REST endpoint handlers organized by resource.

pub mod event;
pub mod page;
pub mod suggestion;
pub mod system;
pub mod viewer;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(page::routes())
        .merge(event::routes())
        .merge(suggestion::routes())
}
