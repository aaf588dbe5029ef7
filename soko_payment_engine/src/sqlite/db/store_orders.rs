use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    cart::PricedLine,
    db_types::{OrderItem, StoreOrder, StoreOrderStatus},
    traits::{AssembledStoreOrder, MarketplaceError},
};

pub async fn insert_store_order(
    order_id: i64,
    store: &AssembledStoreOrder,
    conn: &mut SqliteConnection,
) -> Result<StoreOrder, MarketplaceError> {
    let row: StoreOrder = sqlx::query_as(
        r#"
            INSERT INTO store_orders (
                order_id,
                store_id,
                items_subtotal,
                shipping_fee,
                discount,
                subtotal_with_shipping
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(store.store_id)
    .bind(store.items_subtotal)
    .bind(store.shipping_fee)
    .bind(store.discount)
    .bind(store.subtotal_with_shipping)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn insert_order_items(
    store_order_id: i64,
    lines: &[PricedLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, MarketplaceError> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (
                    store_order_id,
                    product_id,
                    variant_id,
                    name,
                    sku,
                    color,
                    size,
                    unit_price,
                    unit_discount_price,
                    qty,
                    line_total
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *;
            "#,
        )
        .bind(store_order_id)
        .bind(line.product_id)
        .bind(line.variant_id)
        .bind(line.name.as_str())
        .bind(line.sku.as_str())
        .bind(line.color.as_deref())
        .bind(line.size.as_deref())
        .bind(line.unit_price)
        .bind(line.unit_discount_price)
        .bind(line.qty)
        .bind(line.line_total)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

pub async fn fetch_store_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<StoreOrder>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM store_orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row)
}

pub async fn fetch_store_orders_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StoreOrder>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM store_orders WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn fetch_order_items(
    store_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_items WHERE store_order_id = $1 ORDER BY id ASC")
        .bind(store_order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Compare-and-swap on the status column. Returns `None` when the row is no longer in `from`,
/// which is how every caller detects that it lost a race or attempted an illegal transition.
pub async fn transition(
    id: i64,
    from: StoreOrderStatus,
    to: StoreOrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreOrder>, MarketplaceError> {
    let row: Option<StoreOrder> = sqlx::query_as(
        "UPDATE store_orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(id)
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    trace!("📦️ Store order {id} transition {from} -> {to}: {}", if row.is_some() { "applied" } else { "skipped" });
    Ok(row)
}

pub async fn set_accepted(
    id: i64,
    estimated_delivery_date: Option<DateTime<Utc>>,
    delivery_code: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreOrder>, MarketplaceError> {
    let row: Option<StoreOrder> = sqlx::query_as(
        "UPDATE store_orders SET status = 'Accepted', accepted_at = CURRENT_TIMESTAMP, estimated_delivery_date = $1, \
         delivery_code = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status = 'PendingAcceptance' RETURNING *",
    )
    .bind(estimated_delivery_date)
    .bind(delivery_code)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn set_rejected(
    id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<StoreOrder>, MarketplaceError> {
    let row: Option<StoreOrder> = sqlx::query_as(
        "UPDATE store_orders SET status = 'Rejected', rejected_at = CURRENT_TIMESTAMP, rejection_reason = $1, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = 'PendingAcceptance' RETURNING *",
    )
    .bind(reason)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
