//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenValidator;
use crate::domain::{BroadcastRouter, SessionRegistry};
use crate::persistence::InteractionLog;
use crate::service::EventPublisher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Audience-aware fan-out channel.
    pub router: BroadcastRouter,
    /// Typed publishing for write paths.
    pub publisher: EventPublisher,
    /// Live sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Where client interactions are recorded.
    pub interactions: Arc<InteractionLog>,
    /// Handshake token validation.
    pub validator: Arc<dyn TokenValidator>,
    /// Whether handshakes without a token are accepted.
    pub allow_anonymous: bool,
}

impl AppState {
    /// Wires the state around a fresh router of `capacity`.
    #[must_use]
    pub fn new(
        capacity: usize,
        validator: Arc<dyn TokenValidator>,
        interactions: InteractionLog,
        allow_anonymous: bool,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(capacity, Arc::clone(&sessions));
        Self {
            publisher: EventPublisher::new(router.clone()),
            router,
            sessions,
            interactions: Arc::new(interactions),
            validator,
            allow_anonymous,
        }
    }
}
