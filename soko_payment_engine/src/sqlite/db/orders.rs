use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderNo, OrderStatus},
    traits::{AssembledOrder, MarketplaceError},
};

/// Inserts a new order row. Not atomic on its own; embed the call inside a transaction and pass
/// `&mut *tx` as the connection argument.
pub async fn insert_order(order: &AssembledOrder, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    let row: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_no,
                user_id,
                delivery_address_id,
                payment_method,
                items_total,
                shipping_total,
                platform_fee,
                discount_total,
                grand_total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_no.as_str())
    .bind(order.user_id)
    .bind(order.delivery_address_id)
    .bind(order.payment_method.to_string())
    .bind(order.items_total)
    .bind(order.shipping_total)
    .bind(order.platform_fee)
    .bind(order.discount_total)
    .bind(order.grand_total)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order {} inserted with id {}", row.order_no, row.id);
    Ok(row)
}

pub async fn fetch_order_by_order_no(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_no = $1").bind(order_no.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Marks the order as paid. The payment-status predicate makes this a one-shot operation; `None`
/// means some other capture got there first.
pub async fn mark_paid(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, MarketplaceError> {
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = 'Paid', status = 'Paid', paid_at = CURRENT_TIMESTAMP, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $1 AND payment_status != 'Paid' RETURNING *",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Updates the buyer-facing roll-up status. Totals are never touched here.
pub async fn set_status(order_id: i64, status: OrderStatus, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status.to_string())
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_payment_status_refunded(order_id: i64, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query(
        "UPDATE orders SET payment_status = 'Refunded', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND \
         payment_status = 'Paid'",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}
