//! Data Transfer Objects for REST request/response serialization.

pub mod connection_dto;
pub mod event_dto;
pub mod interaction_dto;

pub use connection_dto::*;
pub use event_dto::*;
pub use interaction_dto::*;
