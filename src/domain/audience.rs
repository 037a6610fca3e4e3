//! Connection identities and broadcast audiences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of consumer on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Mobile app / storefront end user.
    #[default]
    Client,
    /// Admin dashboard session.
    Admin,
}

impl ClientType {
    /// Returns the handshake string for this client type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown client type: {other}")),
        }
    }
}

/// Identifier of a storefront user (or admin) as issued by the auth
/// subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-assigned identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target subscriber set of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    /// Every connected admin session.
    AllAdmins,
    /// Every connected end-user session, anonymous ones included.
    AllUsers,
    /// Every connected end-user session of one user.
    User {
        /// Target user.
        user_id: UserId,
    },
}

impl Audience {
    /// Shorthand for [`Audience::User`].
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User {
            user_id: UserId::new(id),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllAdmins => f.write_str("all_admins"),
            Self::AllUsers => f.write_str("all_users"),
            Self::User { user_id } => write!(f, "user:{user_id}"),
        }
    }
}

/// Who is on the other end of one connection, as established at handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned session.
    pub session_id: SessionId,
    /// Client or admin.
    pub client_type: ClientType,
    /// Authenticated user; `None` for anonymous sessions.
    pub user_id: Option<UserId>,
}

impl Identity {
    /// Creates an identity with a fresh session id.
    #[must_use]
    pub fn new(client_type: ClientType, user_id: Option<UserId>) -> Self {
        Self {
            session_id: SessionId::new(),
            client_type,
            user_id,
        }
    }

    /// Returns `true` if this connection belongs to `audience`.
    #[must_use]
    pub fn matches(&self, audience: &Audience) -> bool {
        match audience {
            Audience::AllAdmins => self.client_type == ClientType::Admin,
            Audience::AllUsers => self.client_type == ClientType::Client,
            Audience::User { user_id } => {
                self.client_type == ClientType::Client && self.user_id.as_ref() == Some(user_id)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn admin_matches_only_admin_audience() {
        let admin = Identity::new(ClientType::Admin, Some(UserId::from("A1")));
        assert!(admin.matches(&Audience::AllAdmins));
        assert!(!admin.matches(&Audience::AllUsers));
        assert!(!admin.matches(&Audience::user("A1")));
    }

    #[test]
    fn user_matches_own_target_only() {
        let user = Identity::new(ClientType::Client, Some(UserId::from("U1")));
        assert!(user.matches(&Audience::AllUsers));
        assert!(user.matches(&Audience::user("U1")));
        assert!(!user.matches(&Audience::user("U2")));
        assert!(!user.matches(&Audience::AllAdmins));
    }

    #[test]
    fn anonymous_gets_broadcasts_only() {
        let anon = Identity::new(ClientType::Client, None);
        assert!(anon.matches(&Audience::AllUsers));
        assert!(!anon.matches(&Audience::user("U1")));
    }

    #[test]
    fn audience_json_shape() {
        let json = serde_json::to_value(Audience::user("U7")).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"kind": "user", "user_id": "U7"}));
        let back: Result<Audience, _> = serde_json::from_str(r#"{"kind":"all_admins"}"#);
        assert_eq!(back.ok(), Some(Audience::AllAdmins));
    }

    #[test]
    fn client_type_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<ClientType>().ok(), Some(ClientType::Admin));
        assert!("robot".parse::<ClientType>().is_err());
    }
}
