//! Presence tracking for live connections.
//!
//! [`SessionRegistry`] holds one [`SessionInfo`] per open WebSocket. The
//! broadcast router consults it to count the members of an audience, and
//! the REST layer exposes aggregate counts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::audience::{Audience, ClientType, Identity, SessionId};

/// Metadata about one live connection.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Who is connected.
    pub identity: Identity,
    /// When the handshake completed.
    pub connected_at: DateTime<Utc>,
}

/// Aggregate connection counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PresenceStats {
    /// Connected admin sessions.
    pub admins: usize,
    /// Connected authenticated end-user sessions.
    pub users: usize,
    /// Connected anonymous end-user sessions.
    pub anonymous: usize,
    /// All sessions.
    pub total: usize,
}

/// Registry of live sessions keyed by [`SessionId`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionInfo>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. Re-registering the same id replaces the entry.
    pub async fn register(&self, identity: Identity) -> SessionInfo {
        let info = SessionInfo {
            identity,
            connected_at: Utc::now(),
        };
        let mut map = self.sessions.write().await;
        map.insert(info.identity.session_id, info.clone());
        info
    }

    /// Removes a session, returning its entry if it was present.
    pub async fn unregister(&self, session_id: SessionId) -> Option<SessionInfo> {
        let mut map = self.sessions.write().await;
        map.remove(&session_id)
    }

    /// Number of live sessions belonging to `audience`.
    pub async fn count_matching(&self, audience: &Audience) -> usize {
        let map = self.sessions.read().await;
        map.values()
            .filter(|s| s.identity.matches(audience))
            .count()
    }

    /// Aggregate counts by client type.
    pub async fn stats(&self) -> PresenceStats {
        let map = self.sessions.read().await;
        let mut stats = PresenceStats {
            total: map.len(),
            ..PresenceStats::default()
        };
        for session in map.values() {
            match (session.identity.client_type, &session.identity.user_id) {
                (ClientType::Admin, _) => stats.admins += 1,
                (ClientType::Client, Some(_)) => stats.users += 1,
                (ClientType::Client, None) => stats.anonymous += 1,
            }
        }
        stats
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
