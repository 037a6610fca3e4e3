//! Server-originated control frames.

use serde::Serialize;
use serde_json::json;

use crate::domain::{Envelope, EventKind, EventPayload, Identity};
use crate::domain::payload::AdminPayload;

/// Payload of the `error` frame sent back for a rejected client frame.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    /// HTTP-like status (`400` for malformed frames).
    pub code: u16,
    /// What was wrong.
    pub message: String,
}

/// Renders `{"type":"error","payload":{"code":..,"message":..}}`.
#[must_use]
pub fn error_frame(code: u16, message: impl Into<String>) -> String {
    let frame = ErrorFrame {
        code,
        message: message.into(),
    };
    json!({ "type": "error", "payload": frame }).to_string()
}

/// `admin:connected` / `admin:disconnected` for an admin session.
#[must_use]
pub fn admin_presence(identity: &Identity, connected: bool) -> Envelope {
    let kind = if connected {
        EventKind::AdminConnected
    } else {
        EventKind::AdminDisconnected
    };
    let payload = AdminPayload {
        admin_id: identity.user_id.as_ref().map(|u| u.as_str().to_string()),
        session_id: Some(identity.session_id.to_string()),
        ..AdminPayload::default()
    };
    Envelope::new(kind, EventPayload::Admin(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientType, UserId};

    #[test]
    fn error_frame_shape() {
        let value: serde_json::Value =
            serde_json::from_str(&error_frame(400, "malformed frame")).unwrap_or_default();
        assert_eq!(
            value,
            json!({"type": "error", "payload": {"code": 400, "message": "malformed frame"}})
        );
    }

    #[test]
    fn presence_names_admin_and_session() {
        let admin = Identity::new(ClientType::Admin, Some(UserId::from("A1")));
        let env = admin_presence(&admin, false);
        assert_eq!(env.kind, EventKind::AdminDisconnected);
        let value = env.payload.to_value();
        assert_eq!(value.get("adminId"), Some(&json!("A1")));
        assert_eq!(
            value.get("sessionId"),
            Some(&json!(admin.session_id.to_string()))
        );
    }
}
