use soko_common::Kobo;
use sqlx::SqliteConnection;

use crate::{
    db_types::{WithdrawalRequest, WithdrawalStatus},
    traits::{BankDetails, MarketplaceError},
};

pub async fn insert_request(
    user_id: i64,
    amount: Kobo,
    bank: &BankDetails,
    reference: &str,
    tx_id: &str,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRequest, MarketplaceError> {
    let row: WithdrawalRequest = sqlx::query_as(
        r#"
            INSERT INTO withdrawal_requests (user_id, amount, bank_code, account_number, account_name, reference, tx_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(bank.bank_code.as_str())
    .bind(bank.account_number.as_str())
    .bind(bank.account_name.as_str())
    .bind(reference)
    .bind(tx_id)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM withdrawal_requests WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Moves a live request to its settled status. Terminal rows never match the predicate, which is
/// what makes settlement idempotence-safe: a second attempt returns `None` instead of mutating.
pub async fn settle(
    reference: &str,
    to: WithdrawalStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<WithdrawalRequest>, MarketplaceError> {
    let row: Option<WithdrawalRequest> = sqlx::query_as(
        "UPDATE withdrawal_requests SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2 AND status \
         IN ('Pending', 'Processing') RETURNING *",
    )
    .bind(to.to_string())
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
