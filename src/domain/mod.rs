//! Domain layer: event model, audiences, and the broadcast router.
//!
//! Types here are shared by the server side (router, WebSocket sessions)
//! and the client side (connection manager, dispatcher, cache).

pub mod audience;
pub mod broadcast_router;
pub mod envelope;
pub mod event_kind;
pub mod interaction;
pub mod payload;
pub mod session_registry;

pub use audience::{Audience, ClientType, Identity, SessionId, UserId};
pub use broadcast_router::{BroadcastRouter, RoutedEnvelope};
pub use envelope::{Envelope, ReceivedEnvelope};
pub use event_kind::{EventDomain, EventKind};
pub use interaction::{InteractionFrame, InteractionKind};
pub use payload::EventPayload;
pub use session_registry::{PresenceStats, SessionInfo, SessionRegistry};
