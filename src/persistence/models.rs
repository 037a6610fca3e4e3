//! Database models for recorded client interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Identity, InteractionFrame};

/// One row of the `interactions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredInteraction {
    /// Row ID (monotonic per log).
    pub id: i64,
    /// Session that sent the interaction.
    #[schema(value_type = String)]
    pub session_id: Uuid,
    /// Authenticated user of the session, if any.
    pub user_id: Option<String>,
    /// User the client claimed in the frame.
    pub claimed_user_id: Option<String>,
    /// Interaction name (e.g. `"cart:add_item"`).
    pub event_type: String,
    /// Interaction payload as JSONB.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Client clock at send time.
    pub sent_at: DateTime<Utc>,
    /// Server clock at receipt.
    pub received_at: DateTime<Utc>,
}

/// An interaction about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    /// Session that sent it.
    pub session_id: Uuid,
    /// Authenticated user of the session.
    pub user_id: Option<String>,
    /// Decoded frame.
    pub frame: InteractionFrame,
    /// Server clock at receipt.
    pub received_at: DateTime<Utc>,
}

impl NewInteraction {
    /// Captures `frame` as received from `identity` now.
    #[must_use]
    pub fn from_frame(identity: &Identity, frame: InteractionFrame) -> Self {
        Self {
            session_id: identity.session_id.as_uuid(),
            user_id: identity.user_id.as_ref().map(|u| u.as_str().to_string()),
            frame,
            received_at: Utc::now(),
        }
    }

    /// Materializes the row with `id`.
    #[must_use]
    pub fn into_stored(self, id: i64) -> StoredInteraction {
        StoredInteraction {
            id,
            session_id: self.session_id,
            user_id: self.user_id,
            claimed_user_id: self.frame.user_id,
            event_type: self.frame.kind.as_str().to_string(),
            payload: self.frame.payload,
            sent_at: self.frame.sent_at,
            received_at: self.received_at,
        }
    }
}
