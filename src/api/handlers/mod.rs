//! REST endpoint handlers organized by resource.

pub mod connections;
pub mod events;
pub mod interactions;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(connections::routes())
        .merge(interactions::routes())
}
