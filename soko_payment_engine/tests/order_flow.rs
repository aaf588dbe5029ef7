//! End-to-end order flow: checkout, acceptance, payment capture, delivery, escrow settlement.
mod support;

use std::{future::Future, pin::Pin, time::Duration};

use soko_payment_engine::{
    cart::Cart,
    config::PlatformConfig,
    db_types::{
        EscrowStatus,
        Kobo,
        OrderNo,
        OrderStatus,
        PaymentMethod,
        PaymentStatus,
        StoreOrderStatus,
        TxType,
    },
    events::{EventHandlers, EventHooks},
    traits::PaymentData,
    MarketplaceDatabase,
    MarketplaceError,
    OrderFlowApi,
};
use support::{
    catalog,
    checkout_single,
    new_test_db,
    order_flow,
    paid_store_order,
    shopping_balance,
    wallets,
    ADDRESS,
    BUYER,
    OTHER_STORE,
    STORE,
};

#[tokio::test]
async fn happy_path_wallet_payment() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    wallets(&db).deposit(BUYER, Kobo::from(20_000), None).await.unwrap();

    let checkout = checkout_single(&api).await;
    assert_eq!(checkout.order.items_total, Kobo::from(10_000));
    assert_eq!(checkout.order.shipping_total, Kobo::from(1_000));
    assert_eq!(checkout.order.platform_fee, Kobo::from(150));
    assert_eq!(checkout.order.grand_total, Kobo::from(11_150));
    assert_eq!(checkout.order.payment_status, PaymentStatus::Pending);
    let store_order = &checkout.store_orders[0];
    assert_eq!(store_order.status, StoreOrderStatus::PendingAcceptance);
    assert_eq!(store_order.subtotal_with_shipping, Kobo::from(11_150));

    let accepted = api.accept_order(store_order.id, STORE, None, None).await.unwrap();
    assert_eq!(accepted.status, StoreOrderStatus::Accepted);
    assert!(accepted.accepted_at.is_some());

    let receipt = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap();
    assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
    assert!(receipt.order.paid_at.is_some());
    assert_eq!(receipt.store_orders[0].status, StoreOrderStatus::Paid);
    assert_eq!(receipt.escrows.len(), 1);
    assert_eq!(receipt.escrows[0].status, EscrowStatus::Locked);
    assert_eq!(receipt.escrows[0].amount, Kobo::from(11_150));
    assert_eq!(receipt.transaction.tx_type, TxType::OrderPayment);
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(8_850));

    api.update_fulfillment(store_order.id, STORE, StoreOrderStatus::OutForDelivery, None).await.unwrap();
    let (delivered, released) = api.confirm_delivery(store_order.id, BUYER).await.unwrap();
    assert_eq!(delivered.status, StoreOrderStatus::Delivered);
    assert!(released);
    assert_eq!(shopping_balance(&db, STORE).await, Kobo::from(11_150));

    let escrows = db.fetch_escrows_for_store_order(store_order.id).await.unwrap();
    assert_eq!(escrows[0].status, EscrowStatus::Released);
    assert!(escrows[0].released_at.is_some());

    // Totals were frozen at checkout; nothing downstream may have touched them.
    let final_order = db.fetch_order(&checkout.order.order_no).await.unwrap().unwrap();
    assert_eq!(final_order.grand_total, Kobo::from(11_150));
    assert_eq!(
        final_order.grand_total,
        final_order.items_total + final_order.shipping_total + final_order.platform_fee - final_order.discount_total
    );
    assert_eq!(final_order.status, OrderStatus::Completed);
    assert_eq!(final_order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn insufficient_funds_leaves_everything_unchanged() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    wallets(&db).deposit(BUYER, Kobo::from(500), None).await.unwrap();

    let checkout = checkout_single(&api).await;
    let store_order = &checkout.store_orders[0];
    api.accept_order(store_order.id, STORE, None, None).await.unwrap();

    let err = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InsufficientFunds));

    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(500));
    assert!(db.fetch_escrows_for_store_order(store_order.id).await.unwrap().is_empty());
    let order = db.fetch_order(&checkout.order.order_no).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let store_order = db.fetch_store_order(store_order.id).await.unwrap().unwrap();
    assert_eq!(store_order.status, StoreOrderStatus::Accepted);
}

#[tokio::test]
async fn card_payment_records_the_gateway_reference() {
    let db = new_test_db().await;
    let api = order_flow(&db);

    let checkout = checkout_single(&api).await;
    let store_order = &checkout.store_orders[0];
    api.accept_order(store_order.id, STORE, None, None).await.unwrap();

    let receipt = api
        .pay_order(
            &checkout.order.order_no,
            BUYER,
            PaymentData::Card { gateway_reference: "FLW-20260807-001".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(receipt.transaction.reference.as_deref(), Some("FLW-20260807-001"));
    assert_eq!(receipt.escrows[0].amount, Kobo::from(11_150));
    // no wallet was involved
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(0));

    let blank = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Card { gateway_reference: " ".to_string() });
    assert!(blank.await.is_err());
}

#[tokio::test]
async fn paying_twice_is_rejected() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (order_no, _store_order) = paid_store_order(&db, &api, None).await;

    let err = api.pay_order(&order_no, BUYER, PaymentData::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::OrderAlreadyPaid(_)));
    // the failed second attempt did not touch the wallet
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(8_850));
}

#[tokio::test]
async fn capture_requires_an_accepted_store_order() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    wallets(&db).deposit(BUYER, Kobo::from(20_000), None).await.unwrap();

    let checkout = checkout_single(&api).await;
    let err = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(20_000));
}

#[tokio::test]
async fn multi_store_checkout_splits_and_requires_every_acceptance() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    wallets(&db).deposit(BUYER, Kobo::from(20_000), None).await.unwrap();

    let cart = Cart::new(BUYER).with_line(1, None, 1).with_line(2, None, 1);
    let checkout = api.checkout(&cart, None, &catalog(), ADDRESS, PaymentMethod::Wallet).await.unwrap();
    assert_eq!(checkout.store_orders.len(), 2);
    assert_eq!(checkout.order.grand_total, Kobo::from(18_240));
    let payable: Kobo = checkout.store_orders.iter().map(|so| so.subtotal_with_shipping).sum();
    assert_eq!(payable, checkout.order.grand_total);

    let [first, second] = &checkout.store_orders[..] else { panic!("expected two store orders") };
    let items = db.fetch_order_items(first.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Ankara tote");

    api.accept_order(first.id, STORE, None, None).await.unwrap();

    // one store is still pending acceptance, so capture must refuse the whole order
    let err = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(20_000));

    api.accept_order(second.id, OTHER_STORE, None, None).await.unwrap();
    let receipt = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap();
    assert_eq!(receipt.escrows.len(), 2);
    assert_eq!(receipt.escrows[0].amount, Kobo::from(11_150));
    assert_eq!(receipt.escrows[1].amount, Kobo::from(7_090));
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(1_760));
}

#[tokio::test]
async fn checkout_validation_failures() {
    let db = new_test_db().await;
    let api = order_flow(&db);

    let cart = Cart::new(BUYER).with_line(1, None, 1);
    let err = api.checkout(&cart, None, &catalog(), 0, PaymentMethod::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let empty = Cart::new(BUYER);
    let err = api.checkout(&empty, None, &catalog(), ADDRESS, PaymentMethod::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let missing = OrderNo::from("ORD-0-000000".to_string());
    let err = api.pay_order(&missing, BUYER, PaymentData::Wallet).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::OrderNotFound(_)));
}

#[tokio::test]
async fn payment_captured_event_reaches_subscribers() {
    let db = new_test_db().await;
    wallets(&db).deposit(BUYER, Kobo::from(20_000), None).await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel::<OrderNo>(8);
    let mut hooks = EventHooks::default();
    hooks.on_payment_captured(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev.order.order_no).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = OrderFlowApi::new(db.clone(), PlatformConfig::default(), producers);
    let checkout = checkout_single(&api).await;
    api.accept_order(checkout.store_orders[0].id, STORE, None, None).await.unwrap();
    let receipt = api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for the payment event")
        .expect("event channel closed");
    assert_eq!(received, receipt.order.order_no);
}
