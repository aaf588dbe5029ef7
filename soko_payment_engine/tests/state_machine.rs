//! Store-order state machine: ownership checks, legal transitions, monotonic fulfillment.
mod support;

use soko_payment_engine::{
    db_types::{Kobo, StoreOrderStatus},
    MarketplaceDatabase,
    MarketplaceError,
};
use support::{checkout_single, new_test_db, order_flow, paid_store_order, wallets, BUYER, OTHER_STORE, STORE};

#[tokio::test]
async fn accept_is_only_valid_from_pending_acceptance() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let checkout = checkout_single(&api).await;
    let so = checkout.store_orders[0].id;

    api.accept_order(so, STORE, None, None).await.unwrap();
    let err = api.accept_order(so, STORE, None, None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn reject_requires_a_reason_and_is_terminal() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let checkout = checkout_single(&api).await;
    let so = checkout.store_orders[0].id;

    let err = api.reject_order(so, STORE, "  ").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let rejected = api.reject_order(so, STORE, "out of stock").await.unwrap();
    assert_eq!(rejected.status, StoreOrderStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("out of stock"));
    assert!(rejected.rejected_at.is_some());

    let err = api.accept_order(so, STORE, None, None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
    let err = api.reject_order(so, STORE, "again").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn sellers_cannot_act_on_other_stores_orders() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let checkout = checkout_single(&api).await;
    let so = checkout.store_orders[0].id;

    let err = api.accept_order(so, OTHER_STORE, None, None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Unauthorized(_)));
    let err = api.reject_order(so, OTHER_STORE, "not mine").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Unauthorized(_)));

    // the failed calls did not mutate the row
    let unchanged = db.fetch_store_order(so).await.unwrap().unwrap();
    assert_eq!(unchanged.status, StoreOrderStatus::PendingAcceptance);
}

#[tokio::test]
async fn fulfillment_only_moves_forward() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;
    let so = store_order.id;

    api.update_fulfillment(so, STORE, StoreOrderStatus::Processing, None).await.unwrap();
    api.update_fulfillment(so, STORE, StoreOrderStatus::OutForDelivery, None).await.unwrap();
    let delivered = api.update_fulfillment(so, STORE, StoreOrderStatus::Delivered, None).await.unwrap();
    assert_eq!(delivered.status, StoreOrderStatus::Delivered);

    let err = api.update_fulfillment(so, STORE, StoreOrderStatus::Processing, None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
    let still = db.fetch_store_order(so).await.unwrap().unwrap();
    assert_eq!(still.status, StoreOrderStatus::Delivered);
}

#[tokio::test]
async fn fulfillment_can_skip_forward_but_not_start_unpaid() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let checkout = checkout_single(&api).await;
    let so = checkout.store_orders[0].id;
    api.accept_order(so, STORE, None, None).await.unwrap();

    // accepted but unpaid: the seller cannot start fulfillment
    let err = api.update_fulfillment(so, STORE, StoreOrderStatus::Processing, None).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));

    wallets(&db).deposit(BUYER, Kobo::from(20_000), None).await.unwrap();
    api.pay_order(&checkout.order.order_no, BUYER, soko_payment_engine::traits::PaymentData::Wallet).await.unwrap();

    // paid -> delivered in one step is a legal forward skip
    let delivered = api.update_fulfillment(so, STORE, StoreOrderStatus::Delivered, None).await.unwrap();
    assert_eq!(delivered.status, StoreOrderStatus::Delivered);
}

#[tokio::test]
async fn update_fulfillment_rejects_non_fulfillment_targets() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    for target in [StoreOrderStatus::Accepted, StoreOrderStatus::Rejected, StoreOrderStatus::Cancelled] {
        let err = api.update_fulfillment(store_order.id, STORE, target, None).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Validation(_)), "{target} should not be seller-settable");
    }
}

#[tokio::test]
async fn buyer_confirmation_needs_a_delivery_in_flight() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    // still Paid: nothing to confirm yet
    let err = api.confirm_delivery(store_order.id, BUYER).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));

    api.update_fulfillment(store_order.id, STORE, StoreOrderStatus::OutForDelivery, None).await.unwrap();

    // wrong buyer
    let err = api.confirm_delivery(store_order.id, BUYER + 1).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Unauthorized(_)));

    let (delivered, _) = api.confirm_delivery(store_order.id, BUYER).await.unwrap();
    assert_eq!(delivered.status, StoreOrderStatus::Delivered);
}

#[tokio::test]
async fn every_transition_leaves_an_audit_row() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;
    api.update_fulfillment(store_order.id, STORE, StoreOrderStatus::OutForDelivery, Some("courier picked up".to_string()))
        .await
        .unwrap();
    api.confirm_delivery(store_order.id, BUYER).await.unwrap();

    let trail = db.fetch_tracking(store_order.id).await.unwrap();
    let statuses: Vec<StoreOrderStatus> = trail.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![
            StoreOrderStatus::PendingAcceptance,
            StoreOrderStatus::Accepted,
            StoreOrderStatus::Paid,
            StoreOrderStatus::OutForDelivery,
            StoreOrderStatus::Delivered,
        ]
    );
    assert!(trail.iter().all(|t| !t.performed_by.is_empty()));
    assert_eq!(trail[3].note.as_deref(), Some("courier picked up"));
}
