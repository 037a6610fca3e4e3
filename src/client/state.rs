//! Observable connection state of a consumer.

use serde::Serialize;

use crate::client::transport::TransportKind;

/// Lifecycle state of the single transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in progress (or retries exhausted
    /// after a drop).
    #[default]
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The transport is up.
    Connected,
    /// The last attempt failed.
    Error,
}

/// Snapshot returned by [`crate::client::ConnectionManager::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Current state.
    pub status: ConnectionState,
    /// `true` iff the state is connected and the transport reports open.
    pub connected: bool,
    /// Retries consumed since the last successful connection.
    pub reconnect_attempts: u32,
    /// Rendered error of the last failed attempt.
    pub last_error: Option<String>,
    /// Transport in use while connected.
    pub transport: Option<TransportKind>,
}
