//! Audience-aware fan-out of envelopes to live connections.
//!
//! [`BroadcastRouter`] wraps a [`tokio::sync::broadcast`] channel. Write
//! paths hand it an [`Envelope`] and an [`Audience`]; every connection task
//! holds a receiver and forwards only the envelopes whose audience matches
//! its own identity. Nothing is replayed to sessions that connect later.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::audience::Audience;
use super::envelope::Envelope;
use super::session_registry::SessionRegistry;

/// An envelope tagged with its target audience.
#[derive(Debug, Clone)]
pub struct RoutedEnvelope {
    /// Who should receive it.
    pub audience: Audience,
    /// The shared envelope.
    pub envelope: Arc<Envelope>,
}

/// Broadcast primitive used by backend write paths.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest envelopes are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct BroadcastRouter {
    sender: broadcast::Sender<RoutedEnvelope>,
    sessions: Arc<SessionRegistry>,
}

impl BroadcastRouter {
    /// Creates a router with the given channel capacity over `sessions`.
    #[must_use]
    pub fn new(capacity: usize, sessions: Arc<SessionRegistry>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, sessions }
    }

    /// Offers `envelope` to every currently connected member of `audience`.
    ///
    /// Returns the number of members it was offered to. With no member
    /// online, or no live receiver on the channel, the envelope is dropped
    /// and 0 is returned.
    pub async fn broadcast(&self, envelope: Envelope, audience: Audience) -> usize {
        let members = self.sessions.count_matching(&audience).await;
        if members == 0 {
            tracing::debug!(event_type = %envelope.kind, %audience, "no audience members online");
            return 0;
        }

        let routed = RoutedEnvelope {
            audience,
            envelope: Arc::new(envelope),
        };
        tracing::debug!(
            event_type = %routed.envelope.kind,
            audience = %routed.audience,
            members,
            "broadcasting envelope"
        );
        match self.sender.send(routed) {
            Ok(_) => members,
            Err(broadcast::error::SendError(routed)) => {
                tracing::warn!(
                    event_type = %routed.envelope.kind,
                    members,
                    "registered sessions but no live receiver, envelope dropped"
                );
                0
            }
        }
    }

    /// Creates a receiver that sees every envelope routed from now on.
    ///
    /// Each connection task calls this once after its handshake.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoutedEnvelope> {
        self.sender.subscribe()
    }

    /// The session registry this router counts audiences against.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::audience::{ClientType, Identity, UserId};
    use crate::domain::event_kind::EventKind;

    fn envelope() -> Envelope {
        let Ok(env) = Envelope::from_parts(
            EventKind::OrderStatusUpdated,
            json!({"orderId": "O1", "message": "Shipped"}),
        ) else {
            panic!("bad envelope");
        };
        env
    }

    #[tokio::test]
    async fn broadcast_without_members_returns_zero() {
        let router = BroadcastRouter::new(16, Arc::new(SessionRegistry::new()));
        let mut rx = router.subscribe();
        assert_eq!(router.broadcast(envelope(), Audience::AllUsers).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn member_receives_routed_envelope() {
        let sessions = Arc::new(SessionRegistry::new());
        sessions
            .register(Identity::new(ClientType::Client, Some(UserId::from("U1"))))
            .await;
        let router = BroadcastRouter::new(16, Arc::clone(&sessions));
        let mut rx = router.subscribe();

        let delivered = router.broadcast(envelope(), Audience::user("U1")).await;
        assert_eq!(delivered, 1);

        let Ok(routed) = rx.recv().await else {
            panic!("expected routed envelope");
        };
        assert_eq!(routed.audience, Audience::user("U1"));
        assert_eq!(routed.envelope.kind, EventKind::OrderStatusUpdated);
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_replay() {
        let sessions = Arc::new(SessionRegistry::new());
        sessions
            .register(Identity::new(ClientType::Admin, None))
            .await;
        let router = BroadcastRouter::new(16, sessions);
        let _early = router.subscribe();

        router.broadcast(envelope(), Audience::AllAdmins).await;

        let mut late = router.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn members_without_receiver_count_as_zero() {
        let sessions = Arc::new(SessionRegistry::new());
        sessions
            .register(Identity::new(ClientType::Client, Some(UserId::from("U1"))))
            .await;
        let router = BroadcastRouter::new(16, sessions);
        assert_eq!(router.broadcast(envelope(), Audience::user("U1")).await, 0);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let router = BroadcastRouter::new(16, Arc::new(SessionRegistry::new()));
        assert_eq!(router.receiver_count(), 0);
        let rx = router.subscribe();
        assert_eq!(router.receiver_count(), 1);
        drop(rx);
        assert_eq!(router.receiver_count(), 0);
    }
}
