//! Presence statistics handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ConnectionsResponse;
use crate::app_state::AppState;

/// `GET /connections` — Live session counts.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Presence",
    summary = "Connection counts",
    description = "Returns the number of live admin, authenticated user and anonymous sessions.",
    responses(
        (status = 200, description = "Current presence", body = ConnectionsResponse),
    )
)]
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.sessions.stats().await;
    Json(ConnectionsResponse {
        admins: stats.admins,
        users: stats.users,
        anonymous: stats.anonymous,
        total: stats.total,
    })
}

/// Presence routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/connections", get(list_connections))
}
