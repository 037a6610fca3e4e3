//! Authentication boundary for WebSocket handshakes and the REST surface.
//!
//! Token issuance lives elsewhere; this module only turns a bearer token and
//! a requested client type into an [`Identity`], or rejects the request.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::domain::{ClientType, Identity, UserId};
use crate::error::RealtimeError;

/// What a valid token says about its bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    /// Authenticated user.
    pub user_id: UserId,
    /// Highest client type the token grants.
    pub role: ClientType,
}

/// Validates bearer tokens presented at connection time.
#[async_trait]
pub trait TokenValidator: Send + Sync + fmt::Debug {
    /// Returns the claims of a valid token, `None` otherwise.
    async fn validate(&self, token: &str) -> Option<AuthClaims>;
}

/// Fixed token table, typically loaded from `AUTH_STATIC_TOKENS`.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, AuthClaims>,
}

impl fmt::Debug for StaticTokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenValidator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticTokenValidator {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: &str, role: ClientType) -> Self {
        self.tokens.insert(
            token.into(),
            AuthClaims {
                user_id: UserId::new(user_id),
                role,
            },
        );
        self
    }

    /// Parses comma-separated `token:user_id:role` entries. The role may be
    /// omitted and defaults to `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidRequest`] naming the first malformed
    /// entry.
    pub fn parse(table: &str) -> Result<Self, RealtimeError> {
        let mut validator = Self::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':');
            let (Some(token), Some(user_id)) = (parts.next(), parts.next()) else {
                return Err(RealtimeError::InvalidRequest(format!(
                    "malformed token entry: {entry}"
                )));
            };
            if token.is_empty() || user_id.is_empty() {
                return Err(RealtimeError::InvalidRequest(format!(
                    "malformed token entry: {entry}"
                )));
            }
            let role = match parts.next() {
                Some(role) => role
                    .parse::<ClientType>()
                    .map_err(RealtimeError::InvalidRequest)?,
                None => ClientType::Client,
            };
            validator = validator.with_token(token, user_id, role);
        }
        Ok(validator)
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Option<AuthClaims> {
        self.tokens.get(token).cloned()
    }
}

/// Resolves the identity of a connecting session.
///
/// - valid token → its user, with `admin` granted only to admin tokens;
/// - invalid token → rejected;
/// - no token → anonymous end user if `allow_anonymous`, else rejected.
///
/// # Errors
///
/// Returns [`RealtimeError::Unauthorized`] for missing or unknown tokens and
/// [`RealtimeError::Forbidden`] when a non-admin token asks for `admin`.
pub async fn authenticate(
    validator: &dyn TokenValidator,
    token: Option<&str>,
    requested: ClientType,
    allow_anonymous: bool,
) -> Result<Identity, RealtimeError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        if allow_anonymous && requested == ClientType::Client {
            return Ok(Identity::new(ClientType::Client, None));
        }
        return Err(RealtimeError::Unauthorized("missing token".to_string()));
    };

    let Some(claims) = validator.validate(token).await else {
        return Err(RealtimeError::Unauthorized("invalid token".to_string()));
    };

    if requested == ClientType::Admin && claims.role != ClientType::Admin {
        return Err(RealtimeError::Forbidden(format!(
            "user {} is not an admin",
            claims.user_id
        )));
    }

    Ok(Identity::new(requested, Some(claims.user_id)))
}

/// Checks that `token` belongs to an admin, for backend-only endpoints.
///
/// # Errors
///
/// Returns [`RealtimeError::Unauthorized`] for missing or unknown tokens and
/// [`RealtimeError::Forbidden`] for valid non-admin tokens.
pub async fn authorize_admin(
    validator: &dyn TokenValidator,
    token: Option<&str>,
) -> Result<AuthClaims, RealtimeError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Err(RealtimeError::Unauthorized("missing token".to_string()));
    };
    let Some(claims) = validator.validate(token).await else {
        return Err(RealtimeError::Unauthorized("invalid token".to_string()));
    };
    if claims.role != ClientType::Admin {
        return Err(RealtimeError::Forbidden(format!(
            "user {} is not an admin",
            claims.user_id
        )));
    }
    Ok(claims)
}

/// Extracts the token of an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn validator() -> StaticTokenValidator {
        let Ok(v) = StaticTokenValidator::parse("tok-user:U1:client, tok-admin:A1:admin,tok-bare:U2")
        else {
            panic!("parse failed");
        };
        v
    }

    #[test]
    fn parse_reads_roles() {
        let v = validator();
        assert_eq!(v.len(), 3);
        assert_eq!(
            v.tokens.get("tok-bare").map(|c| c.role),
            Some(ClientType::Client)
        );
        assert_eq!(
            v.tokens.get("tok-admin").map(|c| c.role),
            Some(ClientType::Admin)
        );
        assert!(StaticTokenValidator::parse("").is_ok_and(|v| v.is_empty()));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(StaticTokenValidator::parse("justatoken").is_err());
        assert!(StaticTokenValidator::parse("t:U1:superuser").is_err());
        assert!(StaticTokenValidator::parse(":U1").is_err());
    }

    #[tokio::test]
    async fn valid_user_token() {
        let Ok(identity) = authenticate(&validator(), Some("tok-user"), ClientType::Client, false).await
        else {
            panic!("should authenticate");
        };
        assert_eq!(identity.client_type, ClientType::Client);
        assert_eq!(identity.user_id, Some(UserId::from("U1")));
    }

    #[tokio::test]
    async fn admin_requires_admin_role() {
        let denied = authenticate(&validator(), Some("tok-user"), ClientType::Admin, true).await;
        assert!(matches!(denied, Err(RealtimeError::Forbidden(_))));

        let Ok(admin) = authenticate(&validator(), Some("tok-admin"), ClientType::Admin, false).await
        else {
            panic!("admin should authenticate");
        };
        assert_eq!(admin.client_type, ClientType::Admin);
    }

    #[tokio::test]
    async fn admin_token_may_connect_as_client() {
        let Ok(identity) =
            authenticate(&validator(), Some("tok-admin"), ClientType::Client, false).await
        else {
            panic!("should authenticate");
        };
        assert_eq!(identity.client_type, ClientType::Client);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let result = authenticate(&validator(), Some("nope"), ClientType::Client, true).await;
        assert!(matches!(result, Err(RealtimeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn anonymous_depends_on_policy() {
        let Ok(anon) = authenticate(&validator(), None, ClientType::Client, true).await else {
            panic!("anonymous should be allowed");
        };
        assert!(anon.user_id.is_none());

        let denied = authenticate(&validator(), None, ClientType::Client, false).await;
        assert!(matches!(denied, Err(RealtimeError::Unauthorized(_))));

        let admin = authenticate(&validator(), None, ClientType::Admin, true).await;
        assert!(matches!(admin, Err(RealtimeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn admin_endpoints_need_admin_token() {
        let missing = authorize_admin(&validator(), None).await;
        assert!(matches!(missing, Err(RealtimeError::Unauthorized(_))));

        let unknown = authorize_admin(&validator(), Some("nope")).await;
        assert!(matches!(unknown, Err(RealtimeError::Unauthorized(_))));

        let user = authorize_admin(&validator(), Some("tok-user")).await;
        assert!(matches!(user, Err(RealtimeError::Forbidden(_))));

        let Ok(claims) = authorize_admin(&validator(), Some("tok-admin")).await else {
            panic!("admin should be authorized");
        };
        assert_eq!(claims.user_id, UserId::from("A1"));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
