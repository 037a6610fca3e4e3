//! Service layer: typed publishing for backend write paths.
//!
//! [`EventPublisher`] turns domain mutations into envelopes and routes them
//! through the [`super::domain::BroadcastRouter`].

pub mod publisher;

pub use publisher::{CartChange, EventPublisher};
