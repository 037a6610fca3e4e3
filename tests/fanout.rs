//! End-to-end tests: an in-process server on `127.0.0.1:0`, driven by the
//! crate's own client over WebSocket and by `reqwest` over REST.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use storefront_realtime::api::build_app;
use storefront_realtime::app_state::AppState;
use storefront_realtime::auth::StaticTokenValidator;
use storefront_realtime::client::{
    ClientStorage, ConnectionManager, ConnectionState, Dispatched, MemoryStorage, ReconnectPolicy,
    WsConnector,
};
use storefront_realtime::config::ClientConfig;
use storefront_realtime::domain::{ClientType, EventKind, ReceivedEnvelope};
use storefront_realtime::persistence::InteractionLog;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(allow_anonymous: bool) -> Self {
        let validator = StaticTokenValidator::new()
            .with_token("tok-u1", "U1", ClientType::Client)
            .with_token("tok-u2", "U2", ClientType::Client)
            .with_token("tok-admin", "A1", ClientType::Admin);
        let state = AppState::new(
            64,
            Arc::new(validator),
            InteractionLog::memory(100),
            allow_anonymous,
        );

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_app(state)).await;
        });

        Self {
            addr,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn client(&self, client_type: ClientType) -> (ConnectionManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let config = ClientConfig {
            url: format!("ws://{}/ws", self.addr),
            client_type,
            reconnect: ReconnectPolicy::disabled(),
            connect_timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        let manager = ConnectionManager::new(
            config,
            Arc::clone(&storage) as Arc<dyn ClientStorage>,
            vec![Arc::new(WsConnector)],
        );
        (manager, storage)
    }

    async fn get(&self, path: &str) -> Value {
        self.get_as(path, None).await.1
    }

    async fn get_as(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let Ok(resp) = request.send().await else {
            panic!("GET {path} failed");
        };
        let status = resp.status().as_u16();
        let Ok(body) = resp.json::<Value>().await else {
            panic!("GET {path} returned no JSON");
        };
        (status, body)
    }

    async fn publish(&self, body: Value) -> (u16, Value) {
        self.publish_as(Some("tok-admin"), body).await
    }

    async fn publish_as(&self, token: Option<&str>, body: Value) -> (u16, Value) {
        let mut request = self.http.post(self.url("/api/v1/events")).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let Ok(resp) = request.send().await else {
            panic!("POST /api/v1/events failed");
        };
        let status = resp.status().as_u16();
        let Ok(body) = resp.json::<Value>().await else {
            panic!("publish returned no JSON");
        };
        (status, body)
    }

    /// Waits until the server has registered `total` sessions.
    async fn wait_for_sessions(&self, total: u64) {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let stats = self.get("/api/v1/connections").await;
            if stats.get("total").and_then(Value::as_u64) == Some(total) {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("expected {total} sessions, got {stats}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn collect(manager: &ConnectionManager, kind: EventKind) -> mpsc::UnboundedReceiver<ReceivedEnvelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.on(kind, move |item| {
        if let Dispatched::Event(event) = item {
            tx.send(event.clone())?;
        }
        Ok(())
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ReceivedEnvelope>) -> ReceivedEnvelope {
    match tokio::time::timeout(WAIT, rx.recv()).await {
        Ok(Some(event)) => event,
        _ => panic!("no event received"),
    }
}

#[tokio::test]
async fn order_update_reaches_owner_and_admins_only() {
    let server = TestServer::start(false).await;

    let (u1, _) = server.client(ClientType::Client);
    let (u2, _) = server.client(ClientType::Client);
    let (admin, _) = server.client(ClientType::Admin);
    let mut u1_rx = collect(&u1, EventKind::OrderStatusUpdated);
    let mut u2_rx = collect(&u2, EventKind::OrderStatusUpdated);
    let mut admin_rx = collect(&admin, EventKind::OrderStatusUpdated);

    assert!(u1.connect(Some("tok-u1".to_string())).await.connected);
    assert!(u2.connect(Some("tok-u2".to_string())).await.connected);
    assert!(admin.connect(Some("tok-admin".to_string())).await.connected);
    server.wait_for_sessions(3).await;

    let (status, body) = server
        .publish(json!({
            "type": "order:status_updated",
            "payload": {"orderId": "O1", "userId": "U1", "message": "Shipped"},
        }))
        .await;
    assert_eq!(status, 202);
    assert_eq!(body.get("delivered_to"), Some(&json!(2)));

    let event = next(&mut u1_rx).await;
    assert_eq!(
        event.payload().to_value().get("message"),
        Some(&json!("Shipped"))
    );
    let _ = next(&mut admin_rx).await;

    // The cache holds the order update for the owner.
    let cached = u1.cache().get_all();
    assert_eq!(cached.first().map(|e| e.id.as_str()), Some(event.id.as_str()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(u2_rx.try_recv().is_err());

    u1.disconnect();
    u2.disconnect();
    admin.disconnect();
    server.wait_for_sessions(0).await;
}

#[tokio::test]
async fn catalogue_event_reaches_everyone() {
    let server = TestServer::start(true).await;

    let (anon, _) = server.client(ClientType::Client);
    let (admin, _) = server.client(ClientType::Admin);
    let mut anon_rx = collect(&anon, EventKind::ProductUpdated);
    let mut admin_rx = collect(&admin, EventKind::ProductUpdated);

    assert!(anon.connect(None).await.connected);
    assert!(admin.connect(Some("tok-admin".to_string())).await.connected);
    server.wait_for_sessions(2).await;

    let stats = server.get("/api/v1/connections").await;
    assert_eq!(stats.get("anonymous"), Some(&json!(1)));
    assert_eq!(stats.get("admins"), Some(&json!(1)));

    let (status, _) = server
        .publish(json!({
            "type": "product:updated",
            "payload": {"productId": "P1", "stock": 3},
        }))
        .await;
    assert_eq!(status, 202);

    let _ = next(&mut anon_rx).await;
    let _ = next(&mut admin_rx).await;
    assert!(anon.cache().get_all().is_empty());

    anon.disconnect();
    admin.disconnect();
}

#[tokio::test]
async fn rejected_handshake_surfaces_as_connect_error() {
    let server = TestServer::start(false).await;
    let (client, _) = server.client(ClientType::Client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on(EventKind::ConnectError, move |item| {
        if let Dispatched::ConnectError { error } = item {
            tx.send(error.clone())?;
        }
        Ok(())
    });

    let status = client.connect(Some("bogus".to_string())).await;
    assert_eq!(status.status, ConnectionState::Error);
    assert!(!status.connected);
    assert!(status.last_error.as_deref().is_some_and(|e| e.contains("401")));

    let Ok(Some(error)) = tokio::time::timeout(WAIT, rx.recv()).await else {
        panic!("no connect_error dispatched");
    };
    assert!(error.contains("401"));

    // A client token cannot open an admin session.
    let (pretender, _) = server.client(ClientType::Admin);
    let status = pretender.connect(Some("tok-u1".to_string())).await;
    assert!(status.last_error.as_deref().is_some_and(|e| e.contains("403")));
}

#[tokio::test]
async fn interactions_are_recorded() {
    let server = TestServer::start(false).await;
    let (client, storage) = server.client(ClientType::Client);
    let _ = storage.set("user_data", r#"{"userId":"U1","name":"Ada"}"#);
    let _ = storage.set("auth_token", "tok-u1");

    assert!(client.connect(None).await.connected);
    server.wait_for_sessions(1).await;
    assert!(client.emit_cart_add_item("P1", 2));

    let deadline = tokio::time::Instant::now() + WAIT;
    let rows = loop {
        let (_, body) = server
            .get_as("/api/v1/interactions", Some("tok-admin"))
            .await;
        let rows = body
            .get("interactions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if !rows.is_empty() || tokio::time::Instant::now() > deadline {
            break rows;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    let Some(row) = rows.first() else {
        panic!("interaction not recorded");
    };
    assert_eq!(row.get("event_type"), Some(&json!("cart:add_item")));
    assert_eq!(row.get("user_id"), Some(&json!("U1")));
    assert_eq!(row.get("claimed_user_id"), Some(&json!("U1")));
    assert_eq!(
        row.get("payload"),
        Some(&json!({"productId": "P1", "quantity": 2}))
    );

    // The log is for backend operators only.
    let (status, _) = server.get_as("/api/v1/interactions", None).await;
    assert_eq!(status, 401);
    let (status, _) = server
        .get_as("/api/v1/interactions", Some("tok-u1"))
        .await;
    assert_eq!(status, 403);

    client.disconnect();
    assert!(!client.emit_cart_add_item("P1", 1));
}

#[tokio::test]
async fn admin_presence_is_announced() {
    let server = TestServer::start(false).await;
    let (watcher, _) = server.client(ClientType::Admin);
    let mut joined = collect(&watcher, EventKind::AdminConnected);
    let mut left = collect(&watcher, EventKind::AdminDisconnected);
    assert!(watcher.connect(Some("tok-admin".to_string())).await.connected);
    server.wait_for_sessions(1).await;
    // The watcher may see its own announcement.
    while tokio::time::timeout(Duration::from_millis(100), joined.recv())
        .await
        .is_ok()
    {}

    let (other, _) = server.client(ClientType::Admin);
    assert!(other.connect(Some("tok-admin".to_string())).await.connected);
    let event = next(&mut joined).await;
    assert_eq!(
        event.payload().to_value().get("adminId"),
        Some(&json!("A1"))
    );

    other.disconnect();
    let _ = next(&mut left).await;
    watcher.disconnect();
}

#[tokio::test]
async fn bad_publish_requests_are_rejected() {
    let server = TestServer::start(true).await;

    let (status, body) = server
        .publish(json!({"type": "connect", "payload": {}}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));

    let (status, body) = server
        .publish(json!({"type": "wallet:balance_updated", "payload": 12}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1002)));

    let (status, body) = server
        .publish(json!({
            "type": "promo:flash_sale",
            "payload": {"pct": 20},
            "audience": {"kind": "all_users"},
        }))
        .await;
    assert_eq!(status, 202);
    assert_eq!(body.get("delivered_to"), Some(&json!(0)));

    let forged = json!({
        "type": "order:status_updated",
        "payload": {"orderId": "O1", "userId": "U2", "message": "Refunded"},
    });
    let (status, body) = server.publish_as(None, forged.clone()).await;
    assert_eq!(status, 401);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2001)));
    let (status, body) = server.publish_as(Some("tok-u1"), forged).await;
    assert_eq!(status, 403);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2002)));

    let health = server.get("/health").await;
    assert_eq!(health.get("status"), Some(&json!("healthy")));
}
