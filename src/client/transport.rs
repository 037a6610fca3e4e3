//! Client transports.
//!
//! A [`Connector`] performs one handshake and hands back a
//! [`TransportLink`]: an outbound text sender, an inbound frame receiver
//! and an `open` flag the transport keeps current. The connection manager
//! only ever talks to links, so WebSocket and in-memory transports are
//! interchangeable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::domain::ClientType;
use crate::error::TransportError;

/// Header carrying the client type in the handshake.
pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

/// Transport protocols, in the order a consumer may prefer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Persistent WebSocket.
    #[serde(rename = "websocket")]
    WebSocket,
    /// Long-polling fallback.
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => f.write_str("websocket"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "polling" | "long-polling" => Ok(Self::Polling),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Parameters of one handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Endpoint URL.
    pub url: String,
    /// Bearer token, if any.
    pub token: Option<String>,
    /// Client or admin.
    pub client_type: ClientType,
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("client_type", &self.client_type)
            .finish()
    }
}

/// Something arriving from the server side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Frame(String),
    /// The link closed.
    Closed {
        /// Human-readable reason.
        reason: String,
    },
}

/// An established connection.
#[derive(Debug)]
pub struct TransportLink {
    /// Which transport produced the link.
    pub kind: TransportKind,
    /// Text frames to the server. Dropping the sender closes the link.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and close notices from the server.
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Cleared by the transport as soon as it notices the link is gone.
    pub open: Arc<AtomicBool>,
}

/// Opens links of one [`TransportKind`].
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Transport this connector implements.
    fn kind(&self) -> TransportKind;

    /// Performs the handshake.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the server cannot be reached or
    /// rejects the handshake.
    async fn connect(&self, handshake: &Handshake) -> Result<TransportLink, TransportError>;
}

/// WebSocket transport over `tokio-tungstenite`.
///
/// The token travels as `Authorization: Bearer <token>` and the client
/// type as `X-Client-Type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, handshake: &Handshake) -> Result<TransportLink, TransportError> {
        let mut request = handshake
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let headers = request.headers_mut();
        if let Some(token) = &handshake.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            headers.insert("authorization", value);
        }
        headers.insert(
            CLIENT_TYPE_HEADER,
            HeaderValue::from_static(handshake.client_type.as_str()),
        );

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::Http(response) => {
                    TransportError::Handshake(format!("server responded {}", response.status()))
                }
                other => TransportError::Handshake(other.to_string()),
            })?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let pump_open = Arc::clone(&open);

        tokio::spawn(async move {
            let (mut sink, mut stream) = ws.split();
            let reason = loop {
                tokio::select! {
                    out = out_rx.recv() => match out {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::text(text)).await {
                                break format!("send failed: {e}");
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break "io client disconnect".to_string();
                        }
                    },
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(Inbound::Frame(text.as_str().to_string())).is_err() {
                                let _ = sink.close().await;
                                break "io client disconnect".to_string();
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break frame
                                .map(|f| f.reason.as_str().to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "io server disconnect".to_string());
                        }
                        Some(Err(e)) => break format!("transport error: {e}"),
                        None => break "transport close".to_string(),
                        Some(Ok(_)) => {}
                    },
                }
            };
            pump_open.store(false, Ordering::SeqCst);
            tracing::debug!(%reason, "websocket pump finished");
            let _ = in_tx.send(Inbound::Closed { reason });
        });

        Ok(TransportLink {
            kind: TransportKind::WebSocket,
            outbound: out_tx,
            inbound: in_rx,
            open,
        })
    }
}

/// In-memory transport: every `connect` surfaces as a [`PendingLink`] on
/// the acceptor channel returned by [`ChannelConnector::new`], and the
/// handshake completes only when the acceptor accepts or rejects it.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    kind: TransportKind,
    acceptor: mpsc::UnboundedSender<PendingLink>,
}

impl ChannelConnector {
    /// Creates a connector posing as `kind` and its acceptor queue.
    #[must_use]
    pub fn new(kind: TransportKind) -> (Self, mpsc::UnboundedReceiver<PendingLink>) {
        let (acceptor, pending) = mpsc::unbounded_channel();
        (Self { kind, acceptor }, pending)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn connect(&self, handshake: &Handshake) -> Result<TransportLink, TransportError> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let (reply_tx, reply_rx) = oneshot::channel();

        let pending = PendingLink {
            handshake: handshake.clone(),
            reply: reply_tx,
            server: ServerEnd {
                to_client: in_tx,
                from_client: out_rx,
                open: Arc::clone(&open),
            },
        };
        self.acceptor
            .send(pending)
            .map_err(|_| TransportError::Handshake("acceptor is gone".to_string()))?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(TransportLink {
                kind: self.kind,
                outbound: out_tx,
                inbound: in_rx,
                open,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Handshake("connection refused".to_string())),
        }
    }
}

/// A handshake waiting for the in-memory server to decide.
#[derive(Debug)]
pub struct PendingLink {
    /// What the client sent.
    pub handshake: Handshake,
    reply: oneshot::Sender<Result<(), TransportError>>,
    server: ServerEnd,
}

impl PendingLink {
    /// Completes the handshake and returns the server end of the link.
    #[must_use]
    pub fn accept(self) -> ServerEnd {
        self.server.open.store(true, Ordering::SeqCst);
        let _ = self.reply.send(Ok(()));
        self.server
    }

    /// Fails the handshake with `error`.
    pub fn reject(self, error: TransportError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Server side of an in-memory link.
#[derive(Debug)]
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<Inbound>,
    /// Frames written by the client.
    pub from_client: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
}

impl ServerEnd {
    /// Delivers a text frame to the client. Returns `false` once the client
    /// side is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_client.send(Inbound::Frame(text.into())).is_ok()
    }

    /// Closes the link with `reason`, as a server-side drop would.
    pub fn close(self, reason: impl Into<String>) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.to_client.send(Inbound::Closed {
            reason: reason.into(),
        });
    }

    /// Returns `true` while the link is up.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
