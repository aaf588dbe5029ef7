use log::trace;
use soko_common::Kobo;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BalanceKind, Wallet},
    traits::WalletApiError,
};

fn balance_column(kind: BalanceKind) -> &'static str {
    match kind {
        BalanceKind::Shopping => "shopping_balance",
        BalanceKind::Reward => "reward_balance",
        BalanceKind::Referral => "referral_balance",
        BalanceKind::Loyalty => "loyalty_points",
        BalanceKind::AdCredit => "ad_credit",
    }
}

pub async fn fetch_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, WalletApiError> {
    let wallet =
        sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

/// Creates the wallet row if the user does not have one yet. This is a write, so a transaction
/// that opens with this call takes the database write lock up front.
pub async fn ensure_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<(), WalletApiError> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_or_create_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Wallet, WalletApiError> {
    ensure_wallet(user_id, &mut *conn).await?;
    fetch_wallet(user_id, conn).await?.ok_or(WalletApiError::WalletNotFound(user_id))
}

pub async fn credit_balance(
    user_id: i64,
    amount: Kobo,
    kind: BalanceKind,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletApiError> {
    ensure_wallet(user_id, &mut *conn).await?;
    let col = balance_column(kind);
    let sql =
        format!("UPDATE wallets SET {col} = {col} + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2 RETURNING *");
    let wallet: Option<Wallet> = sqlx::query_as(&sql).bind(amount).bind(user_id).fetch_optional(conn).await?;
    trace!("🏦️ Credited {amount} to the {kind} balance of user {user_id}");
    wallet.ok_or(WalletApiError::WalletNotFound(user_id))
}

/// Debits the targeted balance, or fails with `InsufficientFunds` leaving the wallet untouched.
///
/// The `{col} >= amount` guard rides in the UPDATE predicate itself, so no interleaving of
/// concurrent debits can drive the balance negative.
pub async fn debit_balance(
    user_id: i64,
    amount: Kobo,
    kind: BalanceKind,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletApiError> {
    ensure_wallet(user_id, &mut *conn).await?;
    let col = balance_column(kind);
    let sql = format!(
        "UPDATE wallets SET {col} = {col} - $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2 AND {col} >= $1 \
         RETURNING *"
    );
    let wallet: Option<Wallet> = sqlx::query_as(&sql).bind(amount).bind(user_id).fetch_optional(conn).await?;
    match wallet {
        Some(w) => {
            trace!("🏦️ Debited {amount} from the {kind} balance of user {user_id}");
            Ok(w)
        },
        None => Err(WalletApiError::InsufficientFunds { kind, amount }),
    }
}
