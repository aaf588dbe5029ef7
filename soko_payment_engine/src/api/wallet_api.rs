use soko_common::Kobo;

use crate::{
    db_types::{BalanceKind, TxType, Wallet, WalletTransaction},
    traits::{WalletApiError, WalletManagement},
};

/// Thin wrapper exposing the ledger primitives.
#[derive(Debug, Clone)]
pub struct WalletApi<B> {
    db: B,
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn wallet(&self, user_id: i64) -> Result<Wallet, WalletApiError> {
        self.db.fetch_or_create_wallet(user_id).await
    }

    pub async fn balance(&self, user_id: i64, kind: BalanceKind) -> Result<Kobo, WalletApiError> {
        let wallet = self.db.fetch_wallet(user_id).await?.ok_or(WalletApiError::WalletNotFound(user_id))?;
        Ok(wallet.balance(kind))
    }

    /// Tops up the shopping balance; the entry point the payment gateway's deposit flow calls
    /// once an inbound transfer has been confirmed.
    pub async fn deposit(&self, user_id: i64, amount: Kobo, memo: Option<String>) -> Result<WalletTransaction, WalletApiError> {
        self.db.credit(user_id, amount, BalanceKind::Shopping, TxType::Deposit, memo).await
    }

    pub async fn credit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError> {
        self.db.credit(user_id, amount, kind, tx_type, memo).await
    }

    pub async fn debit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError> {
        self.db.debit(user_id, amount, kind, tx_type, memo).await
    }

    pub async fn history(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletApiError> {
        self.db.fetch_transactions_for_user(user_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
