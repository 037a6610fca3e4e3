//! Request extractors shared by the REST handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::auth::{AuthClaims, authorize_admin, bearer_token};
use crate::error::RealtimeError;

/// Caller authenticated with an admin bearer token.
///
/// Guards the backend-facing endpoints: publishing and the interaction log.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub AuthClaims);

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = RealtimeError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        match authorize_admin(state.validator.as_ref(), token.as_deref()).await {
            Ok(claims) => Ok(Self(claims)),
            Err(e) => {
                tracing::warn!(uri = %parts.uri, error = %e, "admin endpoint rejected");
                Err(e)
            }
        }
    }
}
