//! Withdrawal flow: pessimistic reservation, provider settlement, failure re-credit, and the
//! serialization of concurrent requests against one wallet.
mod support;

use futures_util::future::join_all;
use soko_payment_engine::{
    db_types::{Kobo, TxStatus, WithdrawalStatus},
    events::EventProducers,
    traits::{BankDetails, SettlementOutcome},
    MarketplaceError,
    WalletManagement,
    WithdrawalApi,
};
use support::{new_test_db, shopping_balance, wallets, BUYER};

fn bank() -> BankDetails {
    BankDetails {
        bank_code: "058".to_string(),
        account_number: "0123456789".to_string(),
        account_name: "A. Trader".to_string(),
    }
}

#[tokio::test]
async fn request_reserves_the_balance_immediately() {
    let db = new_test_db().await;
    let api = WithdrawalApi::new(db.clone(), EventProducers::default());
    wallets(&db).deposit(BUYER, Kobo::from(10_000), None).await.unwrap();

    let request = api.request_withdraw(BUYER, Kobo::from(6_000), bank()).await.unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
    assert!(request.tx_id.starts_with("WD-"));
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(4_000));

    let tx = db.fetch_transaction_by_tx_id(&request.tx_id).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Pending);
    assert_eq!(tx.reference.as_deref(), Some(request.reference.as_str()));

    let found = api.status(&request.reference).await.unwrap().unwrap();
    assert_eq!(found.id, request.id);
}

#[tokio::test]
async fn completed_settlement_finalises_without_recredit() {
    let db = new_test_db().await;
    let api = WithdrawalApi::new(db.clone(), EventProducers::default());
    wallets(&db).deposit(BUYER, Kobo::from(10_000), None).await.unwrap();
    let request = api.request_withdraw(BUYER, Kobo::from(6_000), bank()).await.unwrap();

    let settled = api.settle(&request.reference, SettlementOutcome::Completed).await.unwrap();
    assert_eq!(settled.status, WithdrawalStatus::Completed);
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(4_000));
    let tx = db.fetch_transaction_by_tx_id(&request.tx_id).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Success);
}

#[tokio::test]
async fn failed_settlement_recredits_the_wallet() {
    let db = new_test_db().await;
    let api = WithdrawalApi::new(db.clone(), EventProducers::default());
    wallets(&db).deposit(BUYER, Kobo::from(10_000), None).await.unwrap();
    let request = api.request_withdraw(BUYER, Kobo::from(6_000), bank()).await.unwrap();
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(4_000));

    let settled = api
        .settle(&request.reference, SettlementOutcome::Failed { reason: "beneficiary account closed".to_string() })
        .await
        .unwrap();
    assert_eq!(settled.status, WithdrawalStatus::Failed);
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(10_000));
    let tx = db.fetch_transaction_by_tx_id(&request.tx_id).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
}

#[tokio::test]
async fn terminal_requests_cannot_be_settled_again() {
    let db = new_test_db().await;
    let api = WithdrawalApi::new(db.clone(), EventProducers::default());
    wallets(&db).deposit(BUYER, Kobo::from(10_000), None).await.unwrap();
    let request = api.request_withdraw(BUYER, Kobo::from(6_000), bank()).await.unwrap();
    api.settle(&request.reference, SettlementOutcome::Failed { reason: "timeout".to_string() }).await.unwrap();
    let balance_after_refund = shopping_balance(&db, BUYER).await;

    let err = api
        .settle(&request.reference, SettlementOutcome::Failed { reason: "retry".to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::InvalidStateTransition { .. }));
    // no double re-credit
    assert_eq!(shopping_balance(&db, BUYER).await, balance_after_refund);

    let err = api.settle("PYT-0-000000", SettlementOutcome::Completed).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::WithdrawalNotFound(_)));
}

#[tokio::test]
async fn requests_validate_amount_and_bank_details() {
    let db = new_test_db().await;
    let api = WithdrawalApi::new(db.clone(), EventProducers::default());
    wallets(&db).deposit(BUYER, Kobo::from(1_000), None).await.unwrap();

    let err = api.request_withdraw(BUYER, Kobo::from(0), bank()).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let mut bad_bank = bank();
    bad_bank.account_number = "12AB".to_string();
    let err = api.request_withdraw(BUYER, Kobo::from(500), bad_bank).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let err = api.request_withdraw(BUYER, Kobo::from(5_000), bank()).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::InsufficientFunds));
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(1_000));
}

#[tokio::test]
async fn concurrent_requests_cannot_jointly_overdraw() {
    let db = new_test_db().await;
    wallets(&db).deposit(BUYER, Kobo::from(1_000), None).await.unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                let api = WithdrawalApi::new(db, EventProducers::default());
                api.request_withdraw(BUYER, Kobo::from(800), bank()).await.is_ok()
            })
        })
        .collect();
    let outcomes: Vec<bool> = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect();

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "only one 800-kobo reservation fits into 1000");
    assert_eq!(shopping_balance(&db, BUYER).await, Kobo::from(200));
}
