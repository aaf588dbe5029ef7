#![allow(dead_code)]
//! Shared scaffolding for the integration tests: a throwaway database per test and a seeded
//! catalog matching the canonical single-store order (items 10 000, shipping 1 000, fee 150).
use soko_payment_engine::{
    cart::Cart,
    config::PlatformConfig,
    db_types::{Kobo, OrderNo, PaymentMethod, StoreOrder},
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        MemoryCatalog,
    },
    traits::{CatalogProduct, CheckoutResult, PaymentData},
    OrderFlowApi,
    SqliteDatabase,
    WalletApi,
    WalletManagement,
};

pub const BUYER: i64 = 7;
pub const STORE: i64 = 100;
pub const OTHER_STORE: i64 = 200;
pub const ADDRESS: i64 = 1;

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn order_flow(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), PlatformConfig::default(), EventProducers::default())
}

pub fn wallets(db: &SqliteDatabase) -> WalletApi<SqliteDatabase> {
    WalletApi::new(db.clone())
}

/// One store, one product at 10 000 kobo. With the default config this checks out to
/// items 10 000 + shipping 1 000 + fee 150 = grand total 11 150.
pub fn catalog() -> MemoryCatalog {
    MemoryCatalog::default()
        .with_product(CatalogProduct {
            id: 1,
            store_id: STORE,
            name: "Ankara tote".to_string(),
            sku: "TOTE-1".to_string(),
            unit_price: Kobo::from(10_000),
            unit_discount_price: None,
            stock: 50,
        })
        .with_product(CatalogProduct {
            id: 2,
            store_id: OTHER_STORE,
            name: "Leather sandals".to_string(),
            sku: "SAND-2".to_string(),
            unit_price: Kobo::from(6_000),
            unit_discount_price: None,
            stock: 50,
        })
}

pub async fn checkout_single(api: &OrderFlowApi<SqliteDatabase>) -> CheckoutResult {
    let cart = Cart::new(BUYER).with_line(1, None, 1);
    api.checkout(&cart, None, &catalog(), ADDRESS, PaymentMethod::Wallet).await.expect("checkout failed")
}

/// Runs the flow up to a paid store order: deposit, checkout, accept (with the given delivery
/// code), capture via wallet. Returns the order number and the paid store order.
pub async fn paid_store_order(
    db: &SqliteDatabase,
    api: &OrderFlowApi<SqliteDatabase>,
    delivery_code: Option<&str>,
) -> (OrderNo, StoreOrder) {
    wallets(db).deposit(BUYER, Kobo::from(20_000), None).await.expect("deposit failed");
    let checkout = checkout_single(api).await;
    let store_order = &checkout.store_orders[0];
    api.accept_order(store_order.id, STORE, None, delivery_code.map(String::from)).await.expect("accept failed");
    let receipt =
        api.pay_order(&checkout.order.order_no, BUYER, PaymentData::Wallet).await.expect("payment failed");
    (checkout.order.order_no.clone(), receipt.store_orders[0].clone())
}

pub async fn shopping_balance(db: &SqliteDatabase, user_id: i64) -> Kobo {
    db.fetch_wallet(user_id)
        .await
        .expect("wallet fetch failed")
        .map(|w| w.shopping_balance)
        .unwrap_or_default()
}
