//! DTOs for reading the interaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::persistence::models::StoredInteraction;

/// Query parameters for `GET /api/v1/interactions`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InteractionQuery {
    /// Only interactions received strictly after this instant (RFC 3339).
    pub after: Option<DateTime<Utc>>,
    /// Maximum number of rows (1..=500). Defaults to 100.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl InteractionQuery {
    /// Clamps `limit` to the allowed range.
    #[must_use]
    pub fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, 500)
    }
}

/// Response body for `GET /api/v1/interactions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InteractionListResponse {
    /// Backend the rows came from (`disabled`, `memory`, `postgres`).
    pub backend: String,
    /// Rows, oldest first.
    pub interactions: Vec<StoredInteraction>,
}
