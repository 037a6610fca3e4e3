//! WebSocket layer: handshake authentication and per-session fan-out.
//!
//! The endpoint at `/ws` carries server → client envelopes and
//! client → server interaction frames over one connection per consumer.

pub mod connection;
pub mod handler;
pub mod messages;
