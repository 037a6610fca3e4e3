//! Closed taxonomy of server → client event types.
//!
//! Every wire `type` string is namespaced as `<domain>:<action>`. Known
//! strings map onto an [`EventKind`] variant; anything else decodes into
//! [`EventKind::Unrecognized`] so that a newer server never crashes an
//! older consumer.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Domain namespace of an event type (the part before the colon).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventDomain {
    /// Catalogue products.
    Product,
    /// Customer orders.
    Order,
    /// In-app notifications.
    Notification,
    /// Wallet balances.
    Wallet,
    /// Wallet transactions.
    Transaction,
    /// Shopping cart.
    Cart,
    /// User accounts.
    User,
    /// Product reviews.
    Review,
    /// Frequently asked questions.
    Faq,
    /// Catalogue categories.
    Category,
    /// Admin-only channel.
    Admin,
    /// Local connection lifecycle pseudo-events.
    Lifecycle,
    /// Type string not known to this build.
    Unknown,
}

/// A server → client event type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `product:created`
    ProductCreated,
    /// `product:updated`
    ProductUpdated,
    /// `product:deleted`
    ProductDeleted,
    /// `order:created_update`
    OrderCreated,
    /// `order:updated_update`
    OrderUpdated,
    /// `order:status_updated`
    OrderStatusUpdated,
    /// `notification:created`
    NotificationCreated,
    /// `notification:broadcast`
    NotificationBroadcast,
    /// `wallet:balance_updated`
    WalletBalanceUpdated,
    /// `wallet:updated`
    WalletUpdated,
    /// `transaction:created`
    TransactionCreated,
    /// `transaction:status_updated`
    TransactionStatusUpdated,
    /// `cart:item_added`
    CartItemAdded,
    /// `cart:item_updated`
    CartItemUpdated,
    /// `cart:item_removed`
    CartItemRemoved,
    /// `user:created`
    UserCreated,
    /// `user:updated`
    UserUpdated,
    /// `review:created`
    ReviewCreated,
    /// `review:updated`
    ReviewUpdated,
    /// `faq:created`
    FaqCreated,
    /// `faq:updated`
    FaqUpdated,
    /// `category:created`
    CategoryCreated,
    /// `category:updated`
    CategoryUpdated,
    /// `category:deleted`
    CategoryDeleted,
    /// `admin:message`
    AdminMessage,
    /// `admin:notification`
    AdminNotification,
    /// `admin:connected`
    AdminConnected,
    /// `admin:disconnected`
    AdminDisconnected,
    /// Local pseudo-event: the transport connected.
    Connect,
    /// Local pseudo-event: the transport disconnected.
    Disconnect,
    /// Local pseudo-event: a connection attempt failed.
    ConnectError,
    /// Any type string this build does not know.
    Unrecognized(String),
}

impl EventKind {
    /// Parses a wire type string. Never fails: unknown strings become
    /// [`EventKind::Unrecognized`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "product:created" => Self::ProductCreated,
            "product:updated" => Self::ProductUpdated,
            "product:deleted" => Self::ProductDeleted,
            "order:created_update" => Self::OrderCreated,
            "order:updated_update" => Self::OrderUpdated,
            "order:status_updated" => Self::OrderStatusUpdated,
            "notification:created" => Self::NotificationCreated,
            "notification:broadcast" => Self::NotificationBroadcast,
            "wallet:balance_updated" => Self::WalletBalanceUpdated,
            "wallet:updated" => Self::WalletUpdated,
            "transaction:created" => Self::TransactionCreated,
            "transaction:status_updated" => Self::TransactionStatusUpdated,
            "cart:item_added" => Self::CartItemAdded,
            "cart:item_updated" => Self::CartItemUpdated,
            "cart:item_removed" => Self::CartItemRemoved,
            "user:created" => Self::UserCreated,
            "user:updated" => Self::UserUpdated,
            "review:created" => Self::ReviewCreated,
            "review:updated" => Self::ReviewUpdated,
            "faq:created" => Self::FaqCreated,
            "faq:updated" => Self::FaqUpdated,
            "category:created" => Self::CategoryCreated,
            "category:updated" => Self::CategoryUpdated,
            "category:deleted" => Self::CategoryDeleted,
            "admin:message" => Self::AdminMessage,
            "admin:notification" => Self::AdminNotification,
            "admin:connected" => Self::AdminConnected,
            "admin:disconnected" => Self::AdminDisconnected,
            "connect" => Self::Connect,
            "disconnect" => Self::Disconnect,
            "connect_error" => Self::ConnectError,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Returns the wire type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ProductCreated => "product:created",
            Self::ProductUpdated => "product:updated",
            Self::ProductDeleted => "product:deleted",
            Self::OrderCreated => "order:created_update",
            Self::OrderUpdated => "order:updated_update",
            Self::OrderStatusUpdated => "order:status_updated",
            Self::NotificationCreated => "notification:created",
            Self::NotificationBroadcast => "notification:broadcast",
            Self::WalletBalanceUpdated => "wallet:balance_updated",
            Self::WalletUpdated => "wallet:updated",
            Self::TransactionCreated => "transaction:created",
            Self::TransactionStatusUpdated => "transaction:status_updated",
            Self::CartItemAdded => "cart:item_added",
            Self::CartItemUpdated => "cart:item_updated",
            Self::CartItemRemoved => "cart:item_removed",
            Self::UserCreated => "user:created",
            Self::UserUpdated => "user:updated",
            Self::ReviewCreated => "review:created",
            Self::ReviewUpdated => "review:updated",
            Self::FaqCreated => "faq:created",
            Self::FaqUpdated => "faq:updated",
            Self::CategoryCreated => "category:created",
            Self::CategoryUpdated => "category:updated",
            Self::CategoryDeleted => "category:deleted",
            Self::AdminMessage => "admin:message",
            Self::AdminNotification => "admin:notification",
            Self::AdminConnected => "admin:connected",
            Self::AdminDisconnected => "admin:disconnected",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ConnectError => "connect_error",
            Self::Unrecognized(s) => s,
        }
    }

    /// Returns the domain namespace of this kind.
    #[must_use]
    pub const fn domain(&self) -> EventDomain {
        match self {
            Self::ProductCreated | Self::ProductUpdated | Self::ProductDeleted => {
                EventDomain::Product
            }
            Self::OrderCreated | Self::OrderUpdated | Self::OrderStatusUpdated => {
                EventDomain::Order
            }
            Self::NotificationCreated | Self::NotificationBroadcast => EventDomain::Notification,
            Self::WalletBalanceUpdated | Self::WalletUpdated => EventDomain::Wallet,
            Self::TransactionCreated | Self::TransactionStatusUpdated => EventDomain::Transaction,
            Self::CartItemAdded | Self::CartItemUpdated | Self::CartItemRemoved => {
                EventDomain::Cart
            }
            Self::UserCreated | Self::UserUpdated => EventDomain::User,
            Self::ReviewCreated | Self::ReviewUpdated => EventDomain::Review,
            Self::FaqCreated | Self::FaqUpdated => EventDomain::Faq,
            Self::CategoryCreated | Self::CategoryUpdated | Self::CategoryDeleted => {
                EventDomain::Category
            }
            Self::AdminMessage
            | Self::AdminNotification
            | Self::AdminConnected
            | Self::AdminDisconnected => EventDomain::Admin,
            Self::Connect | Self::Disconnect | Self::ConnectError => EventDomain::Lifecycle,
            Self::Unrecognized(_) => EventDomain::Unknown,
        }
    }

    /// Returns `true` for the locally generated connection pseudo-events.
    ///
    /// These must never be accepted from the wire.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self.domain(), EventDomain::Lifecycle)
    }

    /// Returns `true` if events of this kind are kept in the client's
    /// notification cache.
    #[must_use]
    pub const fn is_notification_worthy(&self) -> bool {
        match self.domain() {
            EventDomain::Order
            | EventDomain::Notification
            | EventDomain::Wallet
            | EventDomain::Transaction => true,
            EventDomain::Admin => matches!(self, Self::AdminMessage | Self::AdminNotification),
            _ => false,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
