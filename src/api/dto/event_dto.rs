//! DTOs for publishing events over REST.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::Audience;

/// Request body for `POST /api/v1/events`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Wire type, e.g. `"order:status_updated"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Domain payload; must be an object for known domains.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Value,
    /// Target audience. Omitted: the default route for the event's domain.
    #[serde(default)]
    pub audience: Option<Audience>,
}

/// Response body for `POST /api/v1/events`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishEventResponse {
    /// Wire type that was published.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Live sessions the envelope was offered to.
    pub delivered_to: usize,
}
