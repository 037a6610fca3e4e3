//! Event publisher: the write-path entry point into the fan-out layer.

use crate::domain::payload::{
    AdminPayload, CartPayload, CategoryPayload, FaqPayload, NotificationPayload, OrderPayload,
    ProductPayload, ReviewPayload, TransactionPayload, UserPayload, WalletPayload,
};
use crate::domain::{
    Audience, BroadcastRouter, Envelope, EventDomain, EventKind, EventPayload,
};
use crate::error::RealtimeError;

/// Which cart mutation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// `cart:item_added`
    Added,
    /// `cart:item_updated`
    Updated,
    /// `cart:item_removed`
    Removed,
}

impl CartChange {
    const fn kind(self) -> EventKind {
        match self {
            Self::Added => EventKind::CartItemAdded,
            Self::Updated => EventKind::CartItemUpdated,
            Self::Removed => EventKind::CartItemRemoved,
        }
    }
}

/// Typed publishing on top of a [`BroadcastRouter`].
///
/// Every typed call builds the envelope and routes it with
/// [`EventPublisher::default_audiences`]. Each returns the number of live
/// sessions the envelope was offered to; zero is not an error.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    router: BroadcastRouter,
}

impl EventPublisher {
    /// Creates a publisher over `router`.
    #[must_use]
    pub const fn new(router: BroadcastRouter) -> Self {
        Self { router }
    }

    /// The underlying router.
    #[must_use]
    pub const fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Audiences an envelope goes to when the caller does not choose.
    ///
    /// Catalogue events reach every user and admin. Per-user events reach
    /// their user and the admins, except wallet and cart events which stay
    /// private to the user. A notification without a target user is a
    /// broadcast. Admin events reach admins only.
    #[must_use]
    pub fn default_audiences(envelope: &Envelope) -> Vec<Audience> {
        let user = envelope.payload.user_id().map(Audience::user);
        match envelope.kind.domain() {
            EventDomain::Product
            | EventDomain::Review
            | EventDomain::Faq
            | EventDomain::Category => vec![Audience::AllUsers, Audience::AllAdmins],
            EventDomain::Order | EventDomain::Transaction | EventDomain::User => user
                .into_iter()
                .chain(std::iter::once(Audience::AllAdmins))
                .collect(),
            EventDomain::Notification => match (&envelope.kind, user) {
                (EventKind::NotificationBroadcast, _) | (_, None) => {
                    vec![Audience::AllUsers, Audience::AllAdmins]
                }
                (_, Some(user)) => vec![user, Audience::AllAdmins],
            },
            EventDomain::Wallet | EventDomain::Cart => user.into_iter().collect(),
            EventDomain::Admin => vec![Audience::AllAdmins],
            EventDomain::Lifecycle | EventDomain::Unknown => Vec::new(),
        }
    }

    /// Routes `envelope` to each of `audiences`, returning the total number
    /// of sessions reached.
    pub async fn publish_to(&self, envelope: Envelope, audiences: &[Audience]) -> usize {
        if envelope.kind.is_lifecycle() {
            tracing::warn!(event_type = %envelope.kind, "refusing to publish a reserved event type");
            return 0;
        }
        if audiences.is_empty() {
            tracing::warn!(event_type = %envelope.kind, "event has no audience, dropping");
            return 0;
        }

        let mut delivered = 0;
        for audience in audiences {
            delivered += self.router.broadcast(envelope.clone(), audience.clone()).await;
        }
        tracing::info!(event_type = %envelope.kind, delivered, "event published");
        delivered
    }

    /// Routes `envelope` with [`EventPublisher::default_audiences`].
    pub async fn publish(&self, envelope: Envelope) -> usize {
        let audiences = Self::default_audiences(&envelope);
        self.publish_to(envelope, &audiences).await
    }

    /// Publishes an untyped event, as submitted over REST.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidRequest`] for reserved types, or for
    /// events without an explicit audience and no default route, and
    /// [`RealtimeError::InvalidEnvelope`] when the payload does not fit the
    /// type.
    pub async fn publish_raw(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        audience: Option<Audience>,
    ) -> Result<usize, RealtimeError> {
        let kind = EventKind::parse(event_type);
        if event_type.is_empty() || kind.is_lifecycle() {
            return Err(RealtimeError::InvalidRequest(format!(
                "event type {event_type:?} cannot be published"
            )));
        }
        let envelope = Envelope::from_parts(kind, payload)?;
        let audiences = match audience {
            Some(audience) => vec![audience],
            None => Self::default_audiences(&envelope),
        };
        if audiences.is_empty() {
            return Err(RealtimeError::InvalidRequest(format!(
                "event type {event_type:?} needs an explicit audience"
            )));
        }
        Ok(self.publish_to(envelope, &audiences).await)
    }

    async fn typed(&self, kind: EventKind, payload: EventPayload) -> usize {
        self.publish(Envelope::new(kind, payload)).await
    }

    /// `product:created`
    pub async fn product_created(&self, product: ProductPayload) -> usize {
        self.typed(EventKind::ProductCreated, EventPayload::Product(product))
            .await
    }

    /// `product:updated`
    pub async fn product_updated(&self, product: ProductPayload) -> usize {
        self.typed(EventKind::ProductUpdated, EventPayload::Product(product))
            .await
    }

    /// `product:deleted`
    pub async fn product_deleted(&self, product: ProductPayload) -> usize {
        self.typed(EventKind::ProductDeleted, EventPayload::Product(product))
            .await
    }

    /// `order:created_update`
    pub async fn order_created(&self, order: OrderPayload) -> usize {
        self.typed(EventKind::OrderCreated, EventPayload::Order(order))
            .await
    }

    /// `order:updated_update`
    pub async fn order_updated(&self, order: OrderPayload) -> usize {
        self.typed(EventKind::OrderUpdated, EventPayload::Order(order))
            .await
    }

    /// `order:status_updated`
    pub async fn order_status_updated(&self, order: OrderPayload) -> usize {
        self.typed(EventKind::OrderStatusUpdated, EventPayload::Order(order))
            .await
    }

    /// `notification:created`, targeted at `notification.user_id` when set.
    pub async fn notification_created(&self, notification: NotificationPayload) -> usize {
        self.typed(
            EventKind::NotificationCreated,
            EventPayload::Notification(notification),
        )
        .await
    }

    /// `notification:broadcast`
    pub async fn notification_broadcast(&self, notification: NotificationPayload) -> usize {
        self.typed(
            EventKind::NotificationBroadcast,
            EventPayload::Notification(notification),
        )
        .await
    }

    /// `wallet:balance_updated`
    pub async fn wallet_balance_updated(&self, wallet: WalletPayload) -> usize {
        self.typed(EventKind::WalletBalanceUpdated, EventPayload::Wallet(wallet))
            .await
    }

    /// `wallet:updated`
    pub async fn wallet_updated(&self, wallet: WalletPayload) -> usize {
        self.typed(EventKind::WalletUpdated, EventPayload::Wallet(wallet))
            .await
    }

    /// `transaction:created`
    pub async fn transaction_created(&self, transaction: TransactionPayload) -> usize {
        self.typed(
            EventKind::TransactionCreated,
            EventPayload::Transaction(transaction),
        )
        .await
    }

    /// `transaction:status_updated`
    pub async fn transaction_status_updated(&self, transaction: TransactionPayload) -> usize {
        self.typed(
            EventKind::TransactionStatusUpdated,
            EventPayload::Transaction(transaction),
        )
        .await
    }

    /// `cart:item_added`, `cart:item_updated` or `cart:item_removed`.
    pub async fn cart_changed(&self, change: CartChange, cart: CartPayload) -> usize {
        self.typed(change.kind(), EventPayload::Cart(cart)).await
    }

    /// `user:created`
    pub async fn user_created(&self, user: UserPayload) -> usize {
        self.typed(EventKind::UserCreated, EventPayload::User(user))
            .await
    }

    /// `user:updated`
    pub async fn user_updated(&self, user: UserPayload) -> usize {
        self.typed(EventKind::UserUpdated, EventPayload::User(user))
            .await
    }

    /// `review:created`
    pub async fn review_created(&self, review: ReviewPayload) -> usize {
        self.typed(EventKind::ReviewCreated, EventPayload::Review(review))
            .await
    }

    /// `review:updated`
    pub async fn review_updated(&self, review: ReviewPayload) -> usize {
        self.typed(EventKind::ReviewUpdated, EventPayload::Review(review))
            .await
    }

    /// `faq:created`
    pub async fn faq_created(&self, faq: FaqPayload) -> usize {
        self.typed(EventKind::FaqCreated, EventPayload::Faq(faq)).await
    }

    /// `faq:updated`
    pub async fn faq_updated(&self, faq: FaqPayload) -> usize {
        self.typed(EventKind::FaqUpdated, EventPayload::Faq(faq)).await
    }

    /// `category:created`
    pub async fn category_created(&self, category: CategoryPayload) -> usize {
        self.typed(EventKind::CategoryCreated, EventPayload::Category(category))
            .await
    }

    /// `category:updated`
    pub async fn category_updated(&self, category: CategoryPayload) -> usize {
        self.typed(EventKind::CategoryUpdated, EventPayload::Category(category))
            .await
    }

    /// `category:deleted`
    pub async fn category_deleted(&self, category: CategoryPayload) -> usize {
        self.typed(EventKind::CategoryDeleted, EventPayload::Category(category))
            .await
    }

    /// `admin:message`
    pub async fn admin_message(&self, message: AdminPayload) -> usize {
        self.typed(EventKind::AdminMessage, EventPayload::Admin(message))
            .await
    }

    /// `admin:notification`
    pub async fn admin_notification(&self, notification: AdminPayload) -> usize {
        self.typed(EventKind::AdminNotification, EventPayload::Admin(notification))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::domain::{ClientType, Identity, SessionRegistry, UserId};

    async fn publisher_with(sessions: &[Identity]) -> EventPublisher {
        let registry = Arc::new(SessionRegistry::new());
        for identity in sessions {
            registry.register(identity.clone()).await;
        }
        EventPublisher::new(BroadcastRouter::new(16, registry))
    }

    fn order_for(user: &str) -> OrderPayload {
        OrderPayload {
            order_id: Some("O1".to_string()),
            user_id: Some(user.to_string()),
            status: Some("shipped".to_string()),
            ..OrderPayload::default()
        }
    }

    #[test]
    fn default_routes() {
        let product = Envelope::new(
            EventKind::ProductUpdated,
            EventPayload::Product(ProductPayload::default()),
        );
        assert_eq!(
            EventPublisher::default_audiences(&product),
            vec![Audience::AllUsers, Audience::AllAdmins]
        );

        let order = Envelope::new(EventKind::OrderStatusUpdated, EventPayload::Order(order_for("U1")));
        assert_eq!(
            EventPublisher::default_audiences(&order),
            vec![Audience::user("U1"), Audience::AllAdmins]
        );

        let wallet = Envelope::new(
            EventKind::WalletBalanceUpdated,
            EventPayload::Wallet(WalletPayload {
                user_id: Some("U1".to_string()),
                ..WalletPayload::default()
            }),
        );
        assert_eq!(
            EventPublisher::default_audiences(&wallet),
            vec![Audience::user("U1")]
        );

        let orphan_cart = Envelope::new(
            EventKind::CartItemAdded,
            EventPayload::Cart(CartPayload::default()),
        );
        assert!(EventPublisher::default_audiences(&orphan_cart).is_empty());

        let admin = Envelope::new(
            EventKind::AdminMessage,
            EventPayload::Admin(AdminPayload::default()),
        );
        assert_eq!(
            EventPublisher::default_audiences(&admin),
            vec![Audience::AllAdmins]
        );
    }

    #[tokio::test]
    async fn order_update_reaches_owner_and_admins() {
        let publisher = publisher_with(&[
            Identity::new(ClientType::Client, Some(UserId::from("U1"))),
            Identity::new(ClientType::Client, Some(UserId::from("U2"))),
            Identity::new(ClientType::Admin, Some(UserId::from("A1"))),
        ])
        .await;
        let mut rx = publisher.router().subscribe();

        let delivered = publisher.order_status_updated(order_for("U1")).await;
        assert_eq!(delivered, 2);

        let Ok(first) = rx.recv().await else {
            panic!("nothing routed");
        };
        assert_eq!(first.audience, Audience::user("U1"));
        assert_eq!(first.envelope.kind, EventKind::OrderStatusUpdated);
        let Ok(second) = rx.recv().await else {
            panic!("admin copy missing");
        };
        assert_eq!(second.audience, Audience::AllAdmins);
    }

    #[tokio::test]
    async fn nobody_online_is_not_an_error() {
        let publisher = publisher_with(&[]).await;
        assert_eq!(
            publisher
                .product_created(ProductPayload {
                    product_id: Some("P1".to_string()),
                    ..ProductPayload::default()
                })
                .await,
            0
        );
    }

    #[tokio::test]
    async fn publish_raw_validates() {
        let publisher =
            publisher_with(&[Identity::new(ClientType::Client, Some(UserId::from("U1")))]).await;
        let _rx = publisher.router().subscribe();

        let reserved = publisher.publish_raw("connect", json!({}), None).await;
        assert!(matches!(reserved, Err(RealtimeError::InvalidRequest(_))));

        let bad_payload = publisher
            .publish_raw("order:status_updated", json!("shipped"), None)
            .await;
        assert!(matches!(bad_payload, Err(RealtimeError::InvalidEnvelope(_))));

        let no_route = publisher.publish_raw("promo:flash", json!({}), None).await;
        assert!(matches!(no_route, Err(RealtimeError::InvalidRequest(_))));

        let targeted = publisher
            .publish_raw("promo:flash", json!({"pct": 10}), Some(Audience::user("U1")))
            .await;
        assert!(matches!(targeted, Ok(1)));
    }
}
