//! storefront-realtime server entry point.
//!
//! Starts the Axum HTTP server with the REST and WebSocket endpoints.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use storefront_realtime::api;
use storefront_realtime::app_state::AppState;
use storefront_realtime::auth::StaticTokenValidator;
use storefront_realtime::config::ServerConfig;
use storefront_realtime::persistence::InteractionLog;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting storefront-realtime");

    // Authentication boundary
    let validator = StaticTokenValidator::parse(&config.auth_static_tokens)?;
    if validator.is_empty() && !config.allow_anonymous {
        tracing::warn!("no tokens configured and anonymous access disabled, every handshake will be rejected");
    }
    tracing::info!(tokens = validator.len(), allow_anonymous = config.allow_anonymous, "auth configured");

    // Interaction log
    let interactions = InteractionLog::from_config(&config).await?;
    tracing::info!(backend = interactions.backend(), "interaction log ready");

    let app_state = AppState::new(
        config.event_bus_capacity,
        Arc::new(validator),
        interactions,
        config.allow_anonymous,
    );
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
