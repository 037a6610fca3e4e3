//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::system::health_handler,
        handlers::events::publish_event,
        handlers::connections::list_connections,
        handlers::interactions::list_interactions,
    ),
    components(schemas(
        dto::PublishEventRequest,
        dto::PublishEventResponse,
        dto::ConnectionsResponse,
        dto::InteractionListResponse,
        crate::persistence::models::StoredInteraction,
        crate::domain::Audience,
        crate::domain::UserId,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Events", description = "Publishing events to connected sessions"),
        (name = "Presence", description = "Live session counts"),
        (name = "Analytics", description = "Recorded client interactions"),
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the admin bearer scheme used by `/events` and `/interactions`.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the full application: REST endpoints, the `/ws` endpoint, and
/// the HTTP tracing and CORS layers.
///
/// CORS stays permissive because no endpoint relies on ambient
/// credentials: publishing and the interaction log need an admin bearer
/// token, and the WebSocket handshake carries its own token.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
