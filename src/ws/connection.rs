//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single authenticated connection:
//! forwards routed envelopes whose audience matches the session identity,
//! and records client interaction frames in the interaction log.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{admin_presence, error_frame};
use crate::app_state::AppState;
use crate::domain::{Audience, ClientType, Identity, InteractionFrame};

/// Runs the read/write loop for one WebSocket connection.
///
/// The session is registered for the lifetime of the loop; admin sessions
/// announce themselves to the other admins on both ends of it.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    // Subscribe before registering, so that every broadcast that counts this
    // session also reaches its receiver.
    let mut routed_rx = state.router.subscribe();
    state.sessions.register(identity.clone()).await;

    let session_id = identity.session_id;
    let user_id = identity
        .user_id
        .as_ref()
        .map_or("anonymous", |u| u.as_str())
        .to_string();
    tracing::info!(%session_id, client_type = %identity.client_type, %user_id, "session opened");

    let is_admin = identity.client_type == ClientType::Admin;
    if is_admin {
        state
            .publisher
            .publish_to(admin_presence(&identity, true), &[Audience::AllAdmins])
            .await;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_frame(text.as_str(), &state, &identity).await
                            && ws_tx.send(Message::text(reply)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%session_id, error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            routed = routed_rx.recv() => {
                match routed {
                    Ok(routed) => {
                        if !identity.matches(&routed.audience) {
                            continue;
                        }
                        let json = match routed.envelope.encode() {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!(event_type = %routed.envelope.kind, error = %e, "failed to encode envelope");
                                continue;
                            }
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%session_id, lagged = n, "ws session lagged behind router");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.sessions.unregister(session_id).await;
    if is_admin {
        state
            .publisher
            .publish_to(admin_presence(&identity, false), &[Audience::AllAdmins])
            .await;
    }
    tracing::info!(%session_id, %user_id, "session closed");
}

/// Decodes and records one client frame, returning an error frame to send
/// back if it was rejected.
async fn handle_client_frame(text: &str, state: &AppState, identity: &Identity) -> Option<String> {
    let frame = match serde_json::from_str::<InteractionFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(session_id = %identity.session_id, error = %e, "rejecting client frame");
            return Some(error_frame(400, format!("malformed frame: {e}")));
        }
    };

    let event_type = frame.kind;
    if let (Some(claimed), Some(actual)) = (frame.user_id.as_deref(), identity.user_id.as_ref())
        && claimed != actual.as_str()
    {
        tracing::warn!(
            session_id = %identity.session_id,
            claimed,
            actual = %actual,
            "client frame claims a different user"
        );
    }

    tracing::debug!(session_id = %identity.session_id, %event_type, "client interaction");
    if let Err(e) = state.interactions.record(identity, frame).await {
        tracing::warn!(%event_type, error = %e, "failed to record interaction");
    }
    None
}
