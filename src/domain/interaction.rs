//! Client → server interaction events (fire-and-forget analytics).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Closed set of outbound interaction names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum InteractionKind {
    /// `product:view`
    #[serde(rename = "product:view")]
    ProductView,
    /// `product:search`
    #[serde(rename = "product:search")]
    ProductSearch,
    /// `product:add_to_wishlist`
    #[serde(rename = "product:add_to_wishlist")]
    ProductAddToWishlist,
    /// `order:create`
    #[serde(rename = "order:create")]
    OrderCreate,
    /// `order:track`
    #[serde(rename = "order:track")]
    OrderTrack,
    /// `order:cancel_request`
    #[serde(rename = "order:cancel_request")]
    OrderCancelRequest,
    /// `notification:read`
    #[serde(rename = "notification:read")]
    NotificationRead,
    /// `notification:subscribe`
    #[serde(rename = "notification:subscribe")]
    NotificationSubscribe,
    /// `wallet:balance_request`
    #[serde(rename = "wallet:balance_request")]
    WalletBalanceRequest,
    /// `wallet:add_money`
    #[serde(rename = "wallet:add_money")]
    WalletAddMoney,
    /// `transaction:initiate`
    #[serde(rename = "transaction:initiate")]
    TransactionInitiate,
    /// `cart:add_item`
    #[serde(rename = "cart:add_item")]
    CartAddItem,
    /// `cart:remove_item`
    #[serde(rename = "cart:remove_item")]
    CartRemoveItem,
    /// `cart:checkout_start`
    #[serde(rename = "cart:checkout_start")]
    CartCheckoutStart,
    /// `user:profile_update`
    #[serde(rename = "user:profile_update")]
    UserProfileUpdate,
    /// `user:support_request`
    #[serde(rename = "user:support_request")]
    UserSupportRequest,
    /// `review:submit`
    #[serde(rename = "review:submit")]
    ReviewSubmit,
    /// `faq:question`
    #[serde(rename = "faq:question")]
    FaqQuestion,
    /// `category:browse`
    #[serde(rename = "category:browse")]
    CategoryBrowse,
}

impl InteractionKind {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProductView => "product:view",
            Self::ProductSearch => "product:search",
            Self::ProductAddToWishlist => "product:add_to_wishlist",
            Self::OrderCreate => "order:create",
            Self::OrderTrack => "order:track",
            Self::OrderCancelRequest => "order:cancel_request",
            Self::NotificationRead => "notification:read",
            Self::NotificationSubscribe => "notification:subscribe",
            Self::WalletBalanceRequest => "wallet:balance_request",
            Self::WalletAddMoney => "wallet:add_money",
            Self::TransactionInitiate => "transaction:initiate",
            Self::CartAddItem => "cart:add_item",
            Self::CartRemoveItem => "cart:remove_item",
            Self::CartCheckoutStart => "cart:checkout_start",
            Self::UserProfileUpdate => "user:profile_update",
            Self::UserSupportRequest => "user:support_request",
            Self::ReviewSubmit => "review:submit",
            Self::FaqQuestion => "faq:question",
            Self::CategoryBrowse => "category:browse",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFrame {
    /// Interaction name.
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    /// Interaction-specific data.
    #[serde(default)]
    pub payload: Value,
    /// User the client believes it is acting as (from its stored profile).
    #[serde(default)]
    pub user_id: Option<String>,
    /// Client clock at send time.
    pub sent_at: DateTime<Utc>,
}

impl InteractionFrame {
    /// Builds a frame stamped with the current time.
    #[must_use]
    pub fn new(kind: InteractionKind, payload: Value, user_id: Option<String>) -> Self {
        Self {
            kind,
            payload,
            user_id,
            sent_at: Utc::now(),
        }
    }
}
