use soko_common::Kobo;
use thiserror::Error;

use crate::db_types::{BalanceKind, TxType, Wallet, WalletTransaction};

/// The ledger surface of a backend: lazily-created wallets and the two primitives that move money.
///
/// `credit` and `debit` are atomic: the balance mutation and the transaction record are committed
/// as one unit or not at all. `debit` never drives a balance negative; it fails with
/// [`WalletApiError::InsufficientFunds`] and leaves the wallet untouched.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, WalletApiError>;

    async fn fetch_or_create_wallet(&self, user_id: i64) -> Result<Wallet, WalletApiError>;

    async fn credit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError>;

    async fn debit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError>;

    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletApiError>;

    async fn fetch_transaction_by_tx_id(&self, tx_id: &str) -> Result<Option<WalletTransaction>, WalletApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No wallet exists for user {0}")]
    WalletNotFound(i64),
    #[error("Insufficient funds in the {kind} balance for a debit of {amount}")]
    InsufficientFunds { kind: BalanceKind, amount: Kobo },
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Kobo),
    #[error("A transaction with id {0} already exists")]
    DuplicateTransaction(String),
    #[error("Transaction {0} is already finalised and cannot change status")]
    TransactionFinalised(String),
}

impl From<sqlx::Error> for WalletApiError {
    fn from(e: sqlx::Error) -> Self {
        WalletApiError::DatabaseError(e.to_string())
    }
}
