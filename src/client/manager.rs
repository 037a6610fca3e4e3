//! Client connection manager.
//!
//! Owns at most one transport link at a time, drives the handshake and the
//! reconnect loop, and turns incoming frames into dispatched events.
//!
//! ```text
//! connect() ──► driver task ──► Connector::connect (per preferred transport)
//!                  │                 │
//!                  │   ok ◄──────────┘──────► err → connect_error, backoff
//!                  ▼
//!              pump inbound ──► decode ──► cache (notification-worthy)
//!                  │                   └──► Dispatcher
//!                  ▼
//!              closed → disconnect, backoff → retry / settle
//! ```
//!
//! Every state write is tagged with the generation of the connect sequence
//! that produced it; [`ConnectionManager::disconnect`] bumps the generation,
//! so a stale driver can never resurrect a torn-down session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::client::backoff::Backoff;
use crate::client::cache::NotificationCache;
use crate::client::dispatcher::{Dispatched, Dispatcher, Subscription};
use crate::client::state::{ConnectionState, ConnectionStatus};
use crate::client::storage::{AUTH_TOKEN_KEY, ClientStorage, FileStorage, load_profile};
use crate::client::transport::{
    Connector, Handshake, Inbound, TransportKind, TransportLink, WsConnector,
};
use crate::config::ClientConfig;
use crate::domain::{Envelope, EventKind, InteractionFrame, InteractionKind, ReceivedEnvelope};
use crate::error::{StorageError, TransportError};

/// Handle to the consumer's single real-time connection.
///
/// Cheap to clone; all clones share one connection. Construct one per
/// consumer process and call [`ConnectionManager::disconnect`] at shutdown.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ClientConfig,
    connectors: Vec<Arc<dyn Connector>>,
    storage: Arc<dyn ClientStorage>,
    cache: NotificationCache,
    dispatcher: Dispatcher,
    session: Mutex<Session>,
    status_tx: watch::Sender<ConnectionStatus>,
}

/// The mutable socket slot.
#[derive(Debug, Default)]
struct Session {
    generation: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    open: Option<Arc<AtomicBool>>,
}

impl ConnectionManager {
    /// Creates a manager over explicit storage and connectors.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn ClientStorage>,
        connectors: Vec<Arc<dyn Connector>>,
    ) -> Self {
        let cache = NotificationCache::new(Arc::clone(&storage), config.cache_capacity);
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(Inner {
                config,
                connectors,
                storage,
                cache,
                dispatcher: Dispatcher::new(),
                session: Mutex::new(Session::default()),
                status_tx,
            }),
        }
    }

    /// Creates a manager with file-backed storage under
    /// `config.storage_dir` and the WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the storage directory cannot be created.
    pub fn open(config: ClientConfig) -> Result<Self, StorageError> {
        let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
        Ok(Self::new(config, storage, vec![Arc::new(WsConnector)]))
    }

    /// Connects unless a connection (or an attempt) is already live.
    ///
    /// The token defaults to the one in persisted storage; without one the
    /// handshake goes out unauthenticated. Resolves once the first attempt
    /// has succeeded or failed. Failures surface as `connect_error` events
    /// and in the returned status, never as an `Err`.
    pub async fn connect(&self, token: Option<String>) -> ConnectionStatus {
        let started = {
            let mut session = self.inner.lock_session();
            if session.cancel.is_some() {
                None
            } else {
                session.generation += 1;
                let cancel = CancellationToken::new();
                session.cancel = Some(cancel.clone());
                self.inner.status_tx.send_modify(|s| {
                    *s = ConnectionStatus {
                        status: ConnectionState::Connecting,
                        ..ConnectionStatus::default()
                    };
                });
                Some((session.generation, cancel))
            }
        };

        let Some((generation, cancel)) = started else {
            tracing::debug!("connect called while a connection is live, ignoring");
            let mut rx = self.inner.status_tx.subscribe();
            let _ = rx
                .wait_for(|s| s.status != ConnectionState::Connecting)
                .await;
            return self.status();
        };

        let handshake = Handshake {
            url: self.inner.config.url.clone(),
            token: token.or_else(|| self.inner.stored_token()),
            client_type: self.inner.config.client_type,
        };
        if handshake.token.is_none() {
            tracing::info!("no auth token available, connecting unauthenticated");
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(Arc::clone(&self.inner).drive(generation, cancel, handshake, ready_tx));
        let _ = ready_rx.await;
        self.status()
    }

    /// Closes the transport, removes every registered handler and resets
    /// to `disconnected`. Safe to call at any time.
    pub fn disconnect(&self) {
        let cancel = {
            let mut session = self.inner.lock_session();
            session.generation += 1;
            session.outbound = None;
            if let Some(open) = session.open.take() {
                open.store(false, Ordering::SeqCst);
            }
            session.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
            tracing::info!("realtime connection closed by client");
        }
        self.inner.dispatcher.clear();
        self.inner
            .status_tx
            .send_modify(|s| *s = ConnectionStatus::default());
    }

    /// `true` iff the state is connected and the transport reports open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let mut status = self.inner.status_tx.borrow().clone();
        status.connected = self.inner.is_connected();
        status
    }

    /// Stream of status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Registers `handler` for `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Dispatched) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.dispatcher.on(kind, handler)
    }

    /// Removes one registration.
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner.dispatcher.off(subscription)
    }

    /// Removes every handler for `kind`.
    pub fn off_all(&self, kind: &EventKind) -> usize {
        self.inner.dispatcher.off_all(kind)
    }

    /// The local notification cache.
    #[must_use]
    pub fn cache(&self) -> &NotificationCache {
        &self.inner.cache
    }

    /// The persisted client storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn ClientStorage> {
        &self.inner.storage
    }

    /// Sends one interaction event. Dropped with a warning while not
    /// connected; outbound events are never queued.
    ///
    /// Returns `true` if the frame was handed to the transport.
    pub fn emit(&self, kind: InteractionKind, payload: Value) -> bool {
        if !self.is_connected() {
            tracing::warn!(event = %kind, "socket not connected, dropping outbound event");
            return false;
        }

        let user_id = load_profile(self.inner.storage.as_ref()).and_then(|p| p.user_id);
        let frame = InteractionFrame::new(kind, payload, user_id);
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(event = %kind, error = %e, "failed to encode outbound event");
                return false;
            }
        };

        let session = self.inner.lock_session();
        let sent = session
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(text).is_ok());
        if !sent {
            tracing::warn!(event = %kind, "transport closed, dropping outbound event");
        }
        sent
    }
}

impl Inner {
    fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        let state = self.status_tx.borrow().status;
        let session = self.lock_session();
        state == ConnectionState::Connected
            && session
                .open
                .as_ref()
                .is_some_and(|open| open.load(Ordering::SeqCst))
    }

    fn stored_token(&self) -> Option<String> {
        match self.storage.get(AUTH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored auth token");
                None
            }
        }
    }

    /// Applies `f` to the status if `generation` is still current.
    fn update(&self, generation: u64, f: impl FnOnce(&mut ConnectionStatus)) -> bool {
        let session = self.lock_session();
        if session.generation != generation {
            return false;
        }
        self.status_tx.send_modify(f);
        true
    }

    /// Installs a fresh link into the socket slot.
    fn install(
        &self,
        generation: u64,
        kind: TransportKind,
        outbound: mpsc::UnboundedSender<String>,
        open: Arc<AtomicBool>,
    ) -> bool {
        let mut session = self.lock_session();
        if session.generation != generation {
            return false;
        }
        session.outbound = Some(outbound);
        session.open = Some(open);
        self.status_tx.send_modify(|s| {
            *s = ConnectionStatus {
                status: ConnectionState::Connected,
                connected: true,
                reconnect_attempts: 0,
                last_error: None,
                transport: Some(kind),
            };
        });
        true
    }

    /// Empties the socket slot after the link dropped.
    fn uninstall(&self, generation: u64) {
        let mut session = self.lock_session();
        if session.generation != generation {
            return;
        }
        session.outbound = None;
        session.open = None;
        self.status_tx.send_modify(|s| {
            s.status = ConnectionState::Disconnected;
            s.connected = false;
            s.transport = None;
        });
    }

    /// Releases the connect sequence so a later `connect()` can start anew.
    fn finish(&self, generation: u64) {
        let mut session = self.lock_session();
        if session.generation == generation {
            session.cancel = None;
        }
    }

    /// Tries every preferred transport once, in order.
    async fn open_link(&self, handshake: &Handshake) -> Result<TransportLink, TransportError> {
        let timeout = self.config.connect_timeout;
        let mut last_error = TransportError::NoConnector;

        for preferred in &self.config.transports {
            let Some(connector) = self.connectors.iter().find(|c| c.kind() == *preferred) else {
                tracing::debug!(transport = %preferred, "no connector for transport, skipping");
                continue;
            };
            match tokio::time::timeout(timeout, connector.connect(handshake)).await {
                Ok(Ok(link)) => return Ok(link),
                Ok(Err(e)) => {
                    tracing::debug!(transport = %preferred, error = %e, "transport failed");
                    last_error = e;
                }
                Err(_) => {
                    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(transport = %preferred, timeout_ms = ms, "transport timed out");
                    last_error = TransportError::Timeout(ms);
                }
            }
        }
        Err(last_error)
    }

    /// One connect sequence: attempt, pump, and retry under the backoff
    /// policy until cancelled or out of attempts.
    async fn drive(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        handshake: Handshake,
        ready: oneshot::Sender<()>,
    ) {
        let mut ready = Some(ready);
        let mut backoff = Backoff::new(self.config.reconnect);

        loop {
            self.update(generation, |s| s.status = ConnectionState::Connecting);

            let attempt = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.open_link(&handshake) => result,
            };

            match attempt {
                Ok(link) => {
                    let TransportLink {
                        kind,
                        outbound,
                        mut inbound,
                        open,
                    } = link;
                    if cancel.is_cancelled() || !self.install(generation, kind, outbound, open) {
                        break;
                    }
                    backoff.reset();
                    tracing::info!(transport = %kind, url = %handshake.url, "realtime connection established");
                    self.dispatcher.dispatch(&Dispatched::Connected);
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(());
                    }

                    let Some(reason) = self.pump(&cancel, &mut inbound).await else {
                        break;
                    };
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.uninstall(generation);
                    tracing::warn!(%reason, "realtime connection lost");
                    self.dispatcher
                        .dispatch(&Dispatched::Disconnected { reason });
                }
                Err(e) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let error = e.to_string();
                    tracing::warn!(%error, attempt = backoff.attempts(), "realtime connection failed");
                    self.update(generation, |s| {
                        s.status = ConnectionState::Error;
                        s.connected = false;
                        s.last_error = Some(error.clone());
                    });
                    self.dispatcher
                        .dispatch(&Dispatched::ConnectError { error });
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(());
                    }
                }
            }

            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(
                    attempts = backoff.attempts(),
                    "reconnection stopped, waiting for an explicit connect"
                );
                break;
            };
            let attempts = backoff.attempts();
            self.update(generation, |s| s.reconnect_attempts = attempts);
            tracing::info!(attempt = attempts, delay_ms = delay.as_millis(), "scheduling reconnect");

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.finish(generation);
        drop(ready);
    }

    /// Forwards inbound frames until the link closes (`Some(reason)`) or
    /// the sequence is cancelled (`None`).
    async fn pump(
        &self,
        cancel: &CancellationToken,
        inbound: &mut mpsc::UnboundedReceiver<Inbound>,
    ) -> Option<String> {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                msg = inbound.recv() => match msg {
                    Some(Inbound::Frame(text)) => {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        self.handle_frame(&text);
                    }
                    Some(Inbound::Closed { reason }) => return Some(reason),
                    None => return Some("transport close".to_string()),
                },
            }
        }
    }

    /// Decodes one frame, caches it if notification-worthy, and dispatches.
    fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        if envelope.kind.is_lifecycle() {
            tracing::warn!(event_type = %envelope.kind, "server sent a reserved event type, dropping");
            return;
        }

        let received = if envelope.kind.is_notification_worthy() {
            match self.cache.store(&envelope) {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!(event_type = %envelope.kind, error = %e, "failed to cache notification");
                    ReceivedEnvelope::stamp(envelope)
                }
            }
        } else {
            ReceivedEnvelope::stamp(envelope)
        };

        tracing::debug!(event_type = %received.kind(), id = %received.id, "dispatching event");
        self.dispatcher.dispatch(&Dispatched::Event(received));
    }
}
