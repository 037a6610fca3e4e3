//! Event publishing handler for backend write paths.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishEventRequest, PublishEventResponse};
use crate::api::extract::AdminCaller;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RealtimeError};

/// `POST /events` — Publish one event to an audience.
///
/// # Errors
///
/// Returns [`RealtimeError`] if the caller is not an admin, the type is
/// reserved, the payload does not fit the type, or no audience can be
/// derived.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish an event",
    description = "Builds an envelope from `type` and `payload` and offers it to every connected member of `audience`. Without an audience the default route of the event's domain is used. Delivery is best-effort: sessions that connect later never see the event.",
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event accepted for fan-out", body = PublishEventResponse),
        (status = 400, description = "Reserved type, bad payload or no audience", body = ErrorResponse),
        (status = 401, description = "Missing or unknown bearer token", body = ErrorResponse),
        (status = 403, description = "Token does not belong to an admin", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn publish_event(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, RealtimeError> {
    tracing::debug!(caller = %caller.user_id, event_type = %req.event_type, "publish requested");
    let delivered_to = state
        .publisher
        .publish_raw(&req.event_type, req.payload, req.audience)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            event_type: req.event_type,
            delivered_to,
        }),
    ))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
