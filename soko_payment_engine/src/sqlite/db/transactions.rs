use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWalletTransaction, TxStatus, WalletTransaction},
    traits::WalletApiError,
};

pub async fn insert_transaction(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, WalletApiError> {
    let tx_id = tx.tx_id.clone();
    let record = sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions (tx_id, user_id, amount, tx_type, status, order_id, reference, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(tx.tx_id)
    .bind(tx.user_id)
    .bind(tx.amount)
    .bind(tx.tx_type.to_string())
    .bind(tx.status.to_string())
    .bind(tx.order_id)
    .bind(tx.reference)
    .bind(tx.memo)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => WalletApiError::DuplicateTransaction(tx_id),
        _ => WalletApiError::from(e),
    })?;
    Ok(record)
}

/// Moves a `Pending` transaction to its terminal status. The status predicate makes finalisation
/// a one-shot operation.
pub async fn finalise_transaction(
    tx_id: &str,
    status: TxStatus,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, WalletApiError> {
    let record: Option<WalletTransaction> = sqlx::query_as(
        "UPDATE wallet_transactions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE tx_id = $2 AND status = \
         'Pending' RETURNING *",
    )
    .bind(status.to_string())
    .bind(tx_id)
    .fetch_optional(conn)
    .await?;
    record.ok_or_else(|| WalletApiError::TransactionFinalised(tx_id.to_string()))
}

pub async fn fetch_by_tx_id(
    tx_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, WalletApiError> {
    let record =
        sqlx::query_as("SELECT * FROM wallet_transactions WHERE tx_id = $1").bind(tx_id).fetch_optional(conn).await?;
    Ok(record)
}

pub async fn fetch_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, WalletApiError> {
    let records = sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}
