//! Interaction log (analytics) handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{InteractionListResponse, InteractionQuery};
use crate::api::extract::AdminCaller;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RealtimeError};

/// `GET /interactions` — Recorded client interactions.
///
/// # Errors
///
/// Returns [`RealtimeError::Unauthorized`] or [`RealtimeError::Forbidden`]
/// for non-admin callers and [`RealtimeError::PersistenceError`] if the log
/// cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/interactions",
    tag = "Analytics",
    summary = "List recorded interactions",
    description = "Returns client interaction events received after `after`, oldest first.",
    params(InteractionQuery),
    responses(
        (status = 200, description = "Interaction rows", body = InteractionListResponse),
        (status = 401, description = "Missing or unknown bearer token", body = ErrorResponse),
        (status = 403, description = "Token does not belong to an admin", body = ErrorResponse),
        (status = 500, description = "Log backend failure", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_interactions(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Query(query): Query<InteractionQuery>,
) -> Result<impl IntoResponse, RealtimeError> {
    let interactions = state
        .interactions
        .recent(query.after, query.clamped_limit())
        .await?;

    Ok(Json(InteractionListResponse {
        backend: state.interactions.backend().to_string(),
        interactions,
    }))
}

/// Analytics routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/interactions", get(list_interactions))
}
