//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::{authenticate, bearer_token};
use crate::client::transport::CLIENT_TYPE_HEADER;
use crate::domain::ClientType;
use crate::error::RealtimeError;

/// Handshake parameters accepted in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    /// Bearer token, for clients that cannot set headers.
    pub token: Option<String>,
    /// `client` or `admin`.
    pub client_type: Option<String>,
}

/// `GET /ws` — Authenticates the handshake and upgrades to WebSocket.
///
/// The token comes from `Authorization: Bearer` or `?token=`, the client
/// type from `X-Client-Type` or `?client_type=` (default `client`).
/// Rejected handshakes get the usual JSON error with 400, 401 or 403.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = bearer_token(&headers).or(query.token);
    let requested = headers
        .get(CLIENT_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.client_type);
    let client_type = match requested.as_deref() {
        Some(raw) => match raw.parse::<ClientType>() {
            Ok(ct) => ct,
            Err(e) => return RealtimeError::InvalidRequest(e).into_response(),
        },
        None => ClientType::Client,
    };

    let identity = match authenticate(
        state.validator.as_ref(),
        token.as_deref(),
        client_type,
        state.allow_anonymous,
    )
    .await
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(%client_type, error = %e, "handshake rejected");
            return e.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_connection(socket, state, identity))
}
