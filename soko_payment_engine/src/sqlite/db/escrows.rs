use log::trace;
use soko_common::Kobo;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Escrow, EscrowStatus},
    traits::MarketplaceError,
};

pub async fn insert_locked(
    order_id: i64,
    store_order_id: i64,
    seller_id: i64,
    buyer_id: i64,
    amount: Kobo,
    shipping_fee: Kobo,
    conn: &mut SqliteConnection,
) -> Result<Escrow, MarketplaceError> {
    let escrow: Escrow = sqlx::query_as(
        r#"
            INSERT INTO escrows (order_id, store_order_id, seller_id, buyer_id, amount, shipping_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(store_order_id)
    .bind(seller_id)
    .bind(buyer_id)
    .bind(amount)
    .bind(shipping_fee)
    .fetch_one(conn)
    .await?;
    trace!("🔒️ Locked {amount} in escrow {} for store order {store_order_id}", escrow.id);
    Ok(escrow)
}

fn settle_clause(to: EscrowStatus) -> Result<&'static str, MarketplaceError> {
    match to {
        EscrowStatus::Released => Ok("status = 'Released', released_at = CURRENT_TIMESTAMP"),
        EscrowStatus::Refunded => Ok("status = 'Refunded', refunded_at = CURRENT_TIMESTAMP"),
        EscrowStatus::Locked => {
            Err(MarketplaceError::Validation("an escrow cannot be settled back to Locked".to_string()))
        },
    }
}

/// Atomically claims the locked escrow for a store order and moves it to `to`.
///
/// The `status = 'Locked'` predicate appears both in the id subquery and on the update itself, so
/// of any number of concurrent claimants exactly one gets the row back; the rest see `None`.
pub async fn claim_for_store_order(
    store_order_id: i64,
    to: EscrowStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Escrow>, MarketplaceError> {
    let clause = settle_clause(to)?;
    let sql = format!(
        "UPDATE escrows SET {clause}, updated_at = CURRENT_TIMESTAMP WHERE id = (SELECT id FROM escrows WHERE \
         store_order_id = $1 AND status = 'Locked' LIMIT 1) AND status = 'Locked' RETURNING *"
    );
    let escrow: Option<Escrow> = sqlx::query_as(&sql).bind(store_order_id).fetch_optional(conn).await?;
    Ok(escrow)
}

/// Fallback for escrow rows written before store-order granularity existed: they hang directly
/// off the order with a NULL `store_order_id`.
pub async fn claim_legacy_for_order(
    order_id: i64,
    to: EscrowStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Escrow>, MarketplaceError> {
    let clause = settle_clause(to)?;
    let sql = format!(
        "UPDATE escrows SET {clause}, updated_at = CURRENT_TIMESTAMP WHERE id = (SELECT id FROM escrows WHERE \
         store_order_id IS NULL AND order_id = $1 AND status = 'Locked' LIMIT 1) AND status = 'Locked' RETURNING *"
    );
    let escrow: Option<Escrow> = sqlx::query_as(&sql).bind(order_id).fetch_optional(conn).await?;
    if escrow.is_some() {
        trace!("🔒️ Settled a legacy order-level escrow for order {order_id}");
    }
    Ok(escrow)
}

pub async fn fetch_for_store_order(
    store_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Escrow>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM escrows WHERE store_order_id = $1 ORDER BY id ASC")
        .bind(store_order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
