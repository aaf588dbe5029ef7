use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    cart::{assemble_order, Cart, Coupon},
    config::PlatformConfig,
    db_types::{Actor, OrderNo, PaymentMethod, StoreOrder, StoreOrderStatus},
    events::{
        EscrowRefundedEvent,
        EscrowReleasedEvent,
        EventProducers,
        OrderRejectedEvent,
        PaymentCapturedEvent,
    },
    helpers::new_delivery_code,
    traits::{
        CheckoutResult,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentData,
        PaymentReceipt,
        ProductCatalog,
    },
};

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout, store acceptance,
/// payment capture, fulfillment, delivery confirmation and escrow settlement.
///
/// Events are published only after the corresponding database transaction has committed, so a
/// slow or failing subscriber can never undo a financial mutation.
pub struct OrderFlowApi<B> {
    db: B,
    config: PlatformConfig,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, config: PlatformConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Converts a cart into an order plus one store order per store, with priced line snapshots.
    ///
    /// The cart is priced against the catalog, the platform fee and shipping are added, and the
    /// whole checkout is persisted atomically. The returned totals satisfy
    /// `grand_total = items_total + shipping_total + platform_fee - discount_total`.
    pub async fn checkout<C: ProductCatalog>(
        &self,
        cart: &Cart,
        coupon: Option<&Coupon>,
        catalog: &C,
        delivery_address_id: i64,
        payment_method: PaymentMethod,
    ) -> Result<CheckoutResult, MarketplaceError> {
        if delivery_address_id <= 0 {
            return Err(MarketplaceError::Validation("a delivery address is required".to_string()));
        }
        let priced = cart.price(catalog, coupon).await?;
        let assembled = assemble_order(&priced, &self.config, delivery_address_id, payment_method);
        let result = self.db.insert_checkout(assembled).await?;
        debug!(
            "🔄️📦️ Checkout complete for user {}: order {} across {} stores",
            cart.user_id,
            result.order.order_no,
            result.store_orders.len()
        );
        Ok(result)
    }

    /// Seller accepts a store order. When the platform requires delivery codes and the seller did
    /// not supply one, a code is generated here and stored with the store order.
    pub async fn accept_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        estimated_delivery_date: Option<DateTime<Utc>>,
        delivery_code: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError> {
        let code = match delivery_code {
            Some(code) => Some(code),
            None if self.config.require_delivery_code => Some(new_delivery_code()),
            None => None,
        };
        self.db.accept_store_order(store_order_id, store_id, estimated_delivery_date, code).await
    }

    /// Seller rejects a store order, with a reason. Terminal.
    pub async fn reject_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        reason: &str,
    ) -> Result<StoreOrder, MarketplaceError> {
        let store_order = self.db.reject_store_order(store_order_id, store_id, reason).await?;
        for emitter in &self.producers.order_rejected_producer {
            emitter.publish_event(OrderRejectedEvent { store_order: store_order.clone() }).await;
        }
        Ok(store_order)
    }

    /// Captures payment for an accepted order and locks the proceeds in escrow.
    pub async fn pay_order(
        &self,
        order_no: &OrderNo,
        buyer_id: i64,
        payment: PaymentData,
    ) -> Result<PaymentReceipt, MarketplaceError> {
        let receipt = self.db.capture_payment(order_no, buyer_id, payment).await?;
        for emitter in &self.producers.payment_captured_producer {
            debug!("🔄️💳️ Notifying payment captured hook subscribers");
            emitter
                .publish_event(PaymentCapturedEvent::new(receipt.order.clone(), receipt.store_orders.clone()))
                .await;
        }
        Ok(receipt)
    }

    /// Seller moves a paid store order forward (`Processing`, `OutForDelivery`, `Delivered`).
    pub async fn update_fulfillment(
        &self,
        store_order_id: i64,
        store_id: i64,
        next: StoreOrderStatus,
        note: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError> {
        self.db.update_fulfillment(store_order_id, store_id, next, note).await
    }

    /// Buyer confirms delivery, which triggers escrow release. The release outcome rides in the
    /// second tuple element; `false` there means "no escrow released", which the caller surfaces
    /// as informational, not as a failure of the confirmation itself.
    pub async fn confirm_delivery(
        &self,
        store_order_id: i64,
        buyer_id: i64,
    ) -> Result<(StoreOrder, bool), MarketplaceError> {
        let store_order = self.db.confirm_delivery(store_order_id, buyer_id).await?;
        let released =
            self.release_escrow(store_order_id, Actor::Buyer(buyer_id), "delivery confirmed by buyer").await;
        Ok((store_order, released))
    }

    /// Seller-side delivery confirmation: the courier keys in the code the buyer hands over.
    /// A matching code marks the store order delivered and releases escrow to the seller.
    pub async fn verify_delivery_code(
        &self,
        store_order_id: i64,
        store_id: i64,
        code: &str,
    ) -> Result<(StoreOrder, bool), MarketplaceError> {
        let store_order = self
            .db
            .fetch_store_order(store_order_id)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        if store_order.store_id != store_id {
            return Err(MarketplaceError::Unauthorized(Actor::Seller(store_id)));
        }
        if self.config.require_delivery_code {
            match store_order.delivery_code.as_deref() {
                Some(expected) if expected == code => {},
                _ => return Err(MarketplaceError::Validation("delivery code does not match".to_string())),
            }
        }
        let store_order = if store_order.status == StoreOrderStatus::Delivered {
            store_order
        } else {
            self.db
                .update_fulfillment(
                    store_order_id,
                    store_id,
                    StoreOrderStatus::Delivered,
                    Some("delivery code verified".to_string()),
                )
                .await?
        };
        let released =
            self.release_escrow(store_order_id, Actor::Seller(store_id), "delivery code verified").await;
        Ok((store_order, released))
    }

    /// Admin override for stuck deliveries.
    pub async fn admin_release(&self, store_order_id: i64, admin_id: i64, reason: &str) -> bool {
        self.release_escrow(store_order_id, Actor::Admin(admin_id), reason).await
    }

    /// Releases the locked escrow for the store order to the seller.
    ///
    /// Returns `true` only when this call performed the release. `false` covers both "nothing to
    /// release" (already settled, or never locked) and internal failures; the latter are logged
    /// with enough context to reconcile by hand. Callers in automatic flows must treat `false` as
    /// non-fatal.
    pub async fn release_escrow(&self, store_order_id: i64, performed_by: Actor, reason: &str) -> bool {
        match self.db.release_escrow(store_order_id, performed_by, reason).await {
            Ok(Some(settlement)) => {
                for emitter in &self.producers.escrow_released_producer {
                    emitter
                        .publish_event(EscrowReleasedEvent { escrow: settlement.escrow.clone(), performed_by })
                        .await;
                }
                true
            },
            Ok(None) => {
                debug!("🔓️ Nothing to release for store order {store_order_id} ({performed_by})");
                false
            },
            Err(e) => {
                error!(
                    "🔓️ Escrow release failed for store order {store_order_id} (actor {performed_by}, reason \
                     '{reason}'): {e}. The escrow remains locked; reconcile manually if this persists."
                );
                false
            },
        }
    }

    /// Refunds the locked escrow for the store order to the buyer, moving the store order to
    /// `Cancelled` (pre-delivery cancellation) or `Refunded` (dispute resolved against the
    /// seller). Same boolean contract as [`Self::release_escrow`].
    pub async fn refund_escrow(
        &self,
        store_order_id: i64,
        performed_by: Actor,
        reason: &str,
        next_status: StoreOrderStatus,
    ) -> bool {
        match self.db.refund_escrow(store_order_id, performed_by, reason, next_status).await {
            Ok(Some(settlement)) => {
                for emitter in &self.producers.escrow_refunded_producer {
                    emitter
                        .publish_event(EscrowRefundedEvent { escrow: settlement.escrow.clone(), performed_by })
                        .await;
                }
                true
            },
            Ok(None) => {
                debug!("🔓️ Nothing to refund for store order {store_order_id} ({performed_by})");
                false
            },
            Err(e) => {
                error!(
                    "🔓️ Escrow refund failed for store order {store_order_id} (actor {performed_by}, reason \
                     '{reason}'): {e}. The escrow remains locked; reconcile manually if this persists."
                );
                false
            },
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
