//! Escrow settlement: exactly-once release, refund exclusivity, the legacy order-level fallback
//! and delivery-code verification.
mod support;

use futures_util::future::join_all;
use soko_payment_engine::{
    db_types::{Actor, EscrowStatus, Kobo, PaymentStatus, StoreOrderStatus},
    MarketplaceDatabase,
    MarketplaceError,
};
use support::{checkout_single, new_test_db, order_flow, paid_store_order, shopping_balance, BUYER, STORE};

#[tokio::test]
async fn release_credits_the_seller_exactly_once() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    let first = api.release_escrow(store_order.id, Actor::Admin(1), "manual override").await;
    assert!(first);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));

    let second = api.release_escrow(store_order.id, Actor::Admin(1), "manual override").await;
    assert!(!second);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));

    let escrows = db.fetch_escrows_for_store_order(store_order.id).await.unwrap();
    assert_eq!(escrows.len(), 1);
    assert_eq!(escrows[0].status, EscrowStatus::Released);
}

#[tokio::test]
async fn concurrent_releases_settle_exactly_once() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let db = db.clone();
            let store_order_id = store_order.id;
            tokio::spawn(async move {
                let api = support::order_flow(&db);
                api.release_escrow(store_order_id, Actor::Admin(i), "racing release").await
            })
        })
        .collect();
    let outcomes: Vec<bool> = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect();

    assert_eq!(outcomes.iter().filter(|released| **released).count(), 1);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));
}

#[tokio::test]
async fn release_and_refund_are_mutually_exclusive() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    assert!(api.release_escrow(store_order.id, Actor::Admin(1), "delivered").await);
    let buyer_before = shopping_balance(&db, BUYER).await;

    let refunded =
        api.refund_escrow(store_order.id, Actor::Admin(1), "dispute won by buyer", StoreOrderStatus::Refunded).await;
    assert!(!refunded);
    assert_eq!(shopping_balance(&db, BUYER).await, buyer_before);
}

#[tokio::test]
async fn refund_returns_the_money_to_the_buyer() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (order_no, store_order) = paid_store_order(&db, &api, None).await;
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(8_850));

    let refunded =
        api.refund_escrow(store_order.id, Actor::Admin(9), "dispute won by buyer", StoreOrderStatus::Refunded).await;
    assert!(refunded);
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(20_000));
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(0));

    let updated = db.fetch_store_order(store_order.id).await.unwrap().unwrap();
    assert_eq!(updated.status, StoreOrderStatus::Refunded);
    let order = db.fetch_order(&order_no).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);

    // settled escrow cannot be released afterwards
    assert!(!api.release_escrow(store_order.id, Actor::Admin(9), "too late").await);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(0));
}

#[tokio::test]
async fn legacy_order_level_escrows_are_found_by_the_fallback() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, None).await;

    // Age the escrow row into the pre-store-order shape: linked to the order only.
    sqlx::query("UPDATE escrows SET store_order_id = NULL WHERE store_order_id = $1")
        .bind(store_order.id)
        .execute(db.pool())
        .await
        .unwrap();

    let released = api.release_escrow(store_order.id, Actor::Admin(1), "legacy settlement").await;
    assert!(released);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));

    // and the fallback is also exactly-once
    assert!(!api.release_escrow(store_order.id, Actor::Admin(1), "legacy settlement").await);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));
}

#[tokio::test]
async fn releasing_with_no_escrow_is_a_quiet_no_op() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let checkout = checkout_single(&api).await;
    let so = checkout.store_orders[0].id;
    api.accept_order(so, STORE, None, None).await.unwrap();

    // accepted but never paid, so nothing is locked
    assert!(!api.release_escrow(so, Actor::Admin(1), "nothing here").await);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(0));
}

#[tokio::test]
async fn delivery_code_verification_gates_the_seller_release() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (_, store_order) = paid_store_order(&db, &api, Some("424242")).await;
    api.update_fulfillment(store_order.id, STORE, StoreOrderStatus::OutForDelivery, None).await.unwrap();

    let err = api.verify_delivery_code(store_order.id, STORE, "000000").await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(0));

    let (delivered, released) = api.verify_delivery_code(store_order.id, STORE, "424242").await.unwrap();
    assert_eq!(delivered.status, StoreOrderStatus::Delivered);
    assert!(released);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));
}
