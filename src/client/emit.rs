//! Typed outbound interaction events.
//!
//! One thin wrapper per [`InteractionKind`]; all of them funnel into
//! [`ConnectionManager::emit`] and share its drop-when-disconnected rule.

use serde_json::{Value, json};

use crate::client::manager::ConnectionManager;
use crate::domain::InteractionKind;

impl ConnectionManager {
    /// `product:view`
    pub fn emit_product_view(&self, product_id: &str) -> bool {
        self.emit(InteractionKind::ProductView, json!({ "productId": product_id }))
    }

    /// `product:search`
    pub fn emit_product_search(&self, query: &str, filters: Option<Value>) -> bool {
        self.emit(
            InteractionKind::ProductSearch,
            json!({ "query": query, "filters": filters }),
        )
    }

    /// `product:add_to_wishlist`
    pub fn emit_product_add_to_wishlist(&self, product_id: &str) -> bool {
        self.emit(
            InteractionKind::ProductAddToWishlist,
            json!({ "productId": product_id }),
        )
    }

    /// `order:create`
    pub fn emit_order_create(&self, order: Value) -> bool {
        self.emit(InteractionKind::OrderCreate, order)
    }

    /// `order:track`
    pub fn emit_order_track(&self, order_id: &str) -> bool {
        self.emit(InteractionKind::OrderTrack, json!({ "orderId": order_id }))
    }

    /// `order:cancel_request`
    pub fn emit_order_cancel_request(&self, order_id: &str, reason: &str) -> bool {
        self.emit(
            InteractionKind::OrderCancelRequest,
            json!({ "orderId": order_id, "reason": reason }),
        )
    }

    /// `notification:read`
    pub fn emit_notification_read(&self, notification_id: &str) -> bool {
        self.emit(
            InteractionKind::NotificationRead,
            json!({ "notificationId": notification_id }),
        )
    }

    /// `notification:subscribe`
    pub fn emit_notification_subscribe(&self, topics: &[&str]) -> bool {
        self.emit(
            InteractionKind::NotificationSubscribe,
            json!({ "topics": topics }),
        )
    }

    /// `wallet:balance_request`
    pub fn emit_wallet_balance_request(&self) -> bool {
        self.emit(InteractionKind::WalletBalanceRequest, json!({}))
    }

    /// `wallet:add_money`
    pub fn emit_wallet_add_money(&self, amount: f64, method: &str) -> bool {
        self.emit(
            InteractionKind::WalletAddMoney,
            json!({ "amount": amount, "method": method }),
        )
    }

    /// `transaction:initiate`
    pub fn emit_transaction_initiate(&self, transaction: Value) -> bool {
        self.emit(InteractionKind::TransactionInitiate, transaction)
    }

    /// `cart:add_item`
    pub fn emit_cart_add_item(&self, product_id: &str, quantity: u32) -> bool {
        self.emit(
            InteractionKind::CartAddItem,
            json!({ "productId": product_id, "quantity": quantity }),
        )
    }

    /// `cart:remove_item`
    pub fn emit_cart_remove_item(&self, product_id: &str) -> bool {
        self.emit(
            InteractionKind::CartRemoveItem,
            json!({ "productId": product_id }),
        )
    }

    /// `cart:checkout_start`
    pub fn emit_cart_checkout_start(&self, cart: Value) -> bool {
        self.emit(InteractionKind::CartCheckoutStart, cart)
    }

    /// `user:profile_update`
    pub fn emit_user_profile_update(&self, changes: Value) -> bool {
        self.emit(InteractionKind::UserProfileUpdate, changes)
    }

    /// `user:support_request`
    pub fn emit_user_support_request(&self, subject: &str, message: &str) -> bool {
        self.emit(
            InteractionKind::UserSupportRequest,
            json!({ "subject": subject, "message": message }),
        )
    }

    /// `review:submit`
    pub fn emit_review_submit(&self, product_id: &str, rating: u8, comment: &str) -> bool {
        self.emit(
            InteractionKind::ReviewSubmit,
            json!({ "productId": product_id, "rating": rating, "comment": comment }),
        )
    }

    /// `faq:question`
    pub fn emit_faq_question(&self, question: &str) -> bool {
        self.emit(InteractionKind::FaqQuestion, json!({ "question": question }))
    }

    /// `category:browse`
    pub fn emit_category_browse(&self, category_id: &str) -> bool {
        self.emit(
            InteractionKind::CategoryBrowse,
            json!({ "categoryId": category_id }),
        )
    }
}
