//! The message unit exchanged over the transport.
//!
//! On the wire an envelope is `{"type": "<domain>:<action>", "payload": {..}}`.
//! Consumers stamp it with an `id`, a receipt `timestamp` and a `read` flag,
//! producing a [`ReceivedEnvelope`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event_kind::EventKind;
use super::payload::EventPayload;
use crate::error::DecodeError;

/// A typed event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Domain payload, shaped by `kind`.
    pub payload: EventPayload,
}

/// Untyped wire form, validated into an [`Envelope`].
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = DecodeError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let kind = raw
            .kind
            .filter(|k| !k.is_empty())
            .ok_or(DecodeError::MissingType)?;
        Self::from_parts(EventKind::parse(&kind), raw.payload)
    }
}

impl Envelope {
    /// Creates an envelope from an already-typed payload.
    #[must_use]
    pub const fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self { kind, payload }
    }

    /// Creates an envelope from a kind and an untyped payload, validating
    /// the payload against the kind.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidPayload`] when the payload does not
    /// match the shape `kind` requires.
    pub fn from_parts(kind: EventKind, payload: Value) -> Result<Self, DecodeError> {
        let payload = EventPayload::decode(&kind, payload)?;
        Ok(Self { kind, payload })
    }

    /// Decodes a wire frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the text is not JSON, has no `type`,
    /// or carries a payload of the wrong shape.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Self::try_from(raw)
    }

    /// Encodes the envelope as a wire frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] on serialization failure.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An envelope as held by a consumer after receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReceived")]
pub struct ReceivedEnvelope {
    /// Receipt-time unique identifier.
    pub id: String,
    /// The envelope itself.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Receipt time.
    pub timestamp: DateTime<Utc>,
    /// Whether the user has seen it.
    pub read: bool,
}

#[derive(Debug, Deserialize)]
struct RawReceived {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    read: bool,
}

impl TryFrom<RawReceived> for ReceivedEnvelope {
    type Error = DecodeError;

    fn try_from(raw: RawReceived) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id,
            envelope: Envelope::from_parts(EventKind::parse(&raw.kind), raw.payload)?,
            timestamp: raw.timestamp,
            read: raw.read,
        })
    }
}

impl ReceivedEnvelope {
    /// Stamps `envelope` with a fresh id, the current time and `read: false`.
    #[must_use]
    pub fn stamp(envelope: Envelope) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            envelope,
            timestamp: Utc::now(),
            read: false,
        }
    }

    /// Event type of the wrapped envelope.
    #[must_use]
    pub const fn kind(&self) -> &EventKind {
        &self.envelope.kind
    }

    /// Payload of the wrapped envelope.
    #[must_use]
    pub const fn payload(&self) -> &EventPayload {
        &self.envelope.payload
    }
}
