//! Typed payloads, one shape per event domain.
//!
//! Fields the fan-out layer cares about are typed; anything else a write
//! path attaches is kept verbatim in `extra` so it survives a round trip
//! through the client cache.
//!
//! Typed fields are hints, not a contract: identifiers accept numbers,
//! numeric fields accept numeric strings, and a field that still does not
//! fit its type is kept in `extra` instead of failing the whole event.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event_kind::{EventDomain, EventKind};
use crate::error::DecodeError;

/// Payload of `product:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    /// Product identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub product_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit price.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    /// Units in stock.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub stock: Option<i64>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `order:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Order identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub order_id: Option<String>,
    /// Owning user.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// New order status (e.g. `"shipped"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Human-readable message for the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Order total.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub total: Option<f64>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `notification:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Notification identifier on the backend.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub notification_id: Option<String>,
    /// Target user; absent for broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Short title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `wallet:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPayload {
    /// Wallet owner.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Balance after the change.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub balance: Option<f64>,
    /// ISO currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `transaction:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    /// Transaction identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub transaction_id: Option<String>,
    /// Owning user.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Signed amount.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    /// Settlement status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `cart:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    /// Cart owner.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Affected product.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub product_id: Option<String>,
    /// Quantity after the change.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub quantity: Option<u32>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `user:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    /// User identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `review:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    /// Review identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub review_id: Option<String>,
    /// Reviewed product.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub product_id: Option<String>,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub user_id: Option<String>,
    /// Star rating, 1 to 5.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub rating: Option<u8>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `faq:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqPayload {
    /// FAQ entry identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub faq_id: Option<String>,
    /// Question text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `category:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    /// Category identifier.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub category_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parent category, if nested.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub parent_id: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of `admin:*` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPayload {
    /// Admin the event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub admin_id: Option<String>,
    /// Server session identifier, for presence events.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub session_id: Option<String>,
    /// Short title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of an event, typed by its domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// `product:*`
    Product(ProductPayload),
    /// `order:*`
    Order(OrderPayload),
    /// `notification:*`
    Notification(NotificationPayload),
    /// `wallet:*`
    Wallet(WalletPayload),
    /// `transaction:*`
    Transaction(TransactionPayload),
    /// `cart:*`
    Cart(CartPayload),
    /// `user:*`
    User(UserPayload),
    /// `review:*`
    Review(ReviewPayload),
    /// `faq:*`
    Faq(FaqPayload),
    /// `category:*`
    Category(CategoryPayload),
    /// `admin:*`
    Admin(AdminPayload),
    /// Unrecognized or lifecycle kinds: passed through untouched.
    Opaque(Value),
}

impl EventPayload {
    /// Decodes `value` into the payload shape required by `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidPayload`] if `kind` belongs to a known
    /// domain and `value` is not an object of the expected shape.
    pub fn decode(kind: &EventKind, value: Value) -> Result<Self, DecodeError> {
        let domain = kind.domain();
        if matches!(domain, EventDomain::Unknown | EventDomain::Lifecycle) {
            return Ok(Self::Opaque(value));
        }
        if !value.is_object() {
            return Err(DecodeError::InvalidPayload {
                event_type: kind.to_string(),
                reason: "payload must be a JSON object".to_string(),
            });
        }

        let invalid = |e: serde_json::Error| DecodeError::InvalidPayload {
            event_type: kind.to_string(),
            reason: e.to_string(),
        };

        let payload = match domain {
            EventDomain::Product => Self::Product(decode_hinted(value).map_err(invalid)?),
            EventDomain::Order => Self::Order(decode_hinted(value).map_err(invalid)?),
            EventDomain::Notification => {
                Self::Notification(decode_hinted(value).map_err(invalid)?)
            }
            EventDomain::Wallet => Self::Wallet(decode_hinted(value).map_err(invalid)?),
            EventDomain::Transaction => Self::Transaction(decode_hinted(value).map_err(invalid)?),
            EventDomain::Cart => Self::Cart(decode_hinted(value).map_err(invalid)?),
            EventDomain::User => Self::User(decode_hinted(value).map_err(invalid)?),
            EventDomain::Review => Self::Review(decode_hinted(value).map_err(invalid)?),
            EventDomain::Faq => Self::Faq(decode_hinted(value).map_err(invalid)?),
            EventDomain::Category => Self::Category(decode_hinted(value).map_err(invalid)?),
            EventDomain::Admin => Self::Admin(decode_hinted(value).map_err(invalid)?),
            EventDomain::Lifecycle | EventDomain::Unknown => Self::Opaque(value),
        };
        Ok(payload)
    }

    /// Returns the payload as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns the user the payload is addressed to, if it names one.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Order(p) => p.user_id.as_deref(),
            Self::Notification(p) => p.user_id.as_deref(),
            Self::Wallet(p) => p.user_id.as_deref(),
            Self::Transaction(p) => p.user_id.as_deref(),
            Self::Cart(p) => p.user_id.as_deref(),
            Self::User(p) => p.user_id.as_deref(),
            Self::Review(p) => p.user_id.as_deref(),
            Self::Opaque(v) => v.get("userId").and_then(Value::as_str),
            Self::Product(_) | Self::Faq(_) | Self::Category(_) | Self::Admin(_) => None,
        }
    }
}

/// A payload shape with typed hint fields and a catch-all `extra` map.
trait Hinted: DeserializeOwned {
    fn extra_mut(&mut self) -> &mut Map<String, Value>;
}

macro_rules! hinted {
    ($($payload:ty),* $(,)?) => {
        $(
            impl Hinted for $payload {
                fn extra_mut(&mut self) -> &mut Map<String, Value> {
                    &mut self.extra
                }
            }
        )*
    };
}

hinted!(
    ProductPayload,
    OrderPayload,
    NotificationPayload,
    WalletPayload,
    TransactionPayload,
    CartPayload,
    UserPayload,
    ReviewPayload,
    FaqPayload,
    CategoryPayload,
    AdminPayload,
);

/// Decodes an object into `T`. Fields that do not fit their typed slot are
/// moved, untouched, into `extra`.
fn decode_hinted<T: Hinted>(value: Value) -> Result<T, serde_json::Error> {
    let Value::Object(object) = value else {
        return T::deserialize(value);
    };
    let first_error = match T::deserialize(&object) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };

    let mut fitting = Map::new();
    let mut misfits = Map::new();
    for (key, field) in object {
        let mut single = Map::new();
        single.insert(key, field);
        if T::deserialize(&single).is_ok() {
            fitting.append(&mut single);
        } else {
            misfits.append(&mut single);
        }
    }

    let mut payload = T::deserialize(&fitting).map_err(|_| first_error)?;
    if !misfits.is_empty() {
        tracing::debug!(
            fields = ?misfits.keys().collect::<Vec<_>>(),
            "payload fields kept untyped"
        );
    }
    payload.extra_mut().append(&mut misfits);
    Ok(payload)
}

/// Coercing deserializers for optional hint fields.
mod lenient {
    use std::str::FromStr;

    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts a string or a number, rendering numbers as strings.
    pub fn id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected string or number, got {other}"
            ))),
        }
    }

    /// Accepts a number or a string holding one.
    pub fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + FromStr,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, got {s:?}"))),
            Some(other) => serde_json::from_value(other)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn order_payload_keeps_unknown_fields() {
        let value = json!({"orderId": "O1", "message": "Shipped", "carrier": "DHL"});
        let Ok(EventPayload::Order(order)) =
            EventPayload::decode(&EventKind::OrderStatusUpdated, value)
        else {
            panic!("expected order payload");
        };
        assert_eq!(order.order_id.as_deref(), Some("O1"));
        assert_eq!(order.message.as_deref(), Some("Shipped"));
        assert_eq!(order.extra.get("carrier"), Some(&json!("DHL")));
    }

    #[test]
    fn known_kind_rejects_non_object() {
        let result = EventPayload::decode(&EventKind::ProductCreated, json!("oops"));
        assert!(matches!(result, Err(DecodeError::InvalidPayload { .. })));
    }

    #[test]
    fn hints_are_coerced() {
        let value = json!({"orderId": 4711, "userId": "U1", "total": "12.50"});
        let Ok(EventPayload::Order(order)) =
            EventPayload::decode(&EventKind::OrderCreated, value)
        else {
            panic!("expected order payload");
        };
        assert_eq!(order.order_id.as_deref(), Some("4711"));
        assert_eq!(order.total, Some(12.5));

        let Ok(EventPayload::Cart(cart)) =
            EventPayload::decode(&EventKind::CartItemAdded, json!({"quantity": "3"}))
        else {
            panic!("expected cart payload");
        };
        assert_eq!(cart.quantity, Some(3));
    }

    #[test]
    fn misfit_field_moves_to_extra() {
        let value = json!({"userId": "U1", "balance": "lots", "currency": ["EUR"]});
        let Ok(EventPayload::Wallet(wallet)) =
            EventPayload::decode(&EventKind::WalletUpdated, value.clone())
        else {
            panic!("expected wallet payload");
        };
        assert_eq!(wallet.user_id.as_deref(), Some("U1"));
        assert_eq!(wallet.balance, None);
        assert_eq!(wallet.extra.get("balance"), Some(&json!("lots")));
        assert_eq!(wallet.extra.get("currency"), Some(&json!(["EUR"])));

        // Nothing is lost on the way back out.
        assert_eq!(EventPayload::Wallet(wallet).to_value(), value);
    }

    #[test]
    fn unknown_kind_is_opaque() {
        let kind = EventKind::parse("loyalty:points_earned");
        let result = EventPayload::decode(&kind, json!([1, 2, 3]));
        assert_eq!(result.ok(), Some(EventPayload::Opaque(json!([1, 2, 3]))));
    }

    #[test]
    fn to_value_is_camel_case() {
        let payload = EventPayload::Cart(CartPayload {
            user_id: Some("U1".to_string()),
            product_id: Some("P1".to_string()),
            quantity: Some(2),
            extra: Map::new(),
        });
        assert_eq!(
            payload.to_value(),
            json!({"userId": "U1", "productId": "P1", "quantity": 2})
        );
        assert_eq!(payload.user_id(), Some("U1"));
    }
}
