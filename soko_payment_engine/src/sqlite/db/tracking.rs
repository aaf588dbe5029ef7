use sqlx::SqliteConnection;

use crate::{
    db_types::{Actor, OrderTracking, StoreOrderStatus},
    traits::MarketplaceError,
};

/// Appends an audit row. Every store-order transition calls this inside the same transaction that
/// performs the transition.
pub async fn insert_tracking(
    store_order_id: i64,
    status: StoreOrderStatus,
    note: Option<&str>,
    performed_by: Actor,
    delivery_code: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<OrderTracking, MarketplaceError> {
    let row: OrderTracking = sqlx::query_as(
        r#"
            INSERT INTO order_tracking (store_order_id, status, note, performed_by, delivery_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(store_order_id)
    .bind(status.to_string())
    .bind(note)
    .bind(performed_by.to_string())
    .bind(delivery_code)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_for_store_order(
    store_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderTracking>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_tracking WHERE store_order_id = $1 ORDER BY id ASC")
        .bind(store_order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
