//! DTOs for presence statistics.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /api/v1/connections`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsResponse {
    /// Connected admin sessions.
    pub admins: usize,
    /// Connected authenticated end-user sessions.
    pub users: usize,
    /// Connected anonymous end-user sessions.
    pub anonymous: usize,
    /// All sessions.
    pub total: usize,
}
