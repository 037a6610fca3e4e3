//! # storefront-realtime
//!
//! Real-time event fan-out for the storefront: a WebSocket broadcast router
//! that pushes domain changes from backend write paths to connected mobile
//! apps and admin dashboards, and the client-side connection manager those
//! consumers embed.
//!
//! ## Architecture
//!
//! ```text
//! Write paths (REST POST /api/v1/events, EventPublisher)
//!     │
//!     ├── EventPublisher (service/)      default audience routing
//!     ├── BroadcastRouter (domain/)      tokio broadcast + SessionRegistry
//!     │
//!     ├── WS sessions (ws/)              auth at handshake, audience filter
//!     │      └── InteractionLog (persistence/)  client → server analytics
//!     │
//! Consumers
//!     └── ConnectionManager (client/)    reconnect, Dispatcher, NotificationCache
//! ```
//!
//! Delivery is best-effort: nothing is replayed to sessions that were
//! offline when an event was published.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
