use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderId, OrderLine, OrderStatusType, UserId},
    pricing::{OrderTotals, PricedLine},
    traits::OrderError,
};

pub async fn insert_order(
    user_id: UserId,
    totals: OrderTotals,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderError> {
    let now = Utc::now();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (user_id, original_total, discount_total, final_total, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'PENDING', $5, $5)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(totals.original_total)
    .bind(totals.discount_total)
    .bind(totals.final_total)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn insert_line(
    order_id: OrderId,
    line_no: i64,
    line: &PricedLine,
    conn: &mut SqliteConnection,
) -> Result<OrderLine, OrderError> {
    let line = sqlx::query_as(
        r#"
            INSERT INTO order_lines (order_id, line_no, product_id, quantity, unit_price, coupon_id, discount, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(line_no)
    .bind(line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.coupon_id)
    .bind(line.discount)
    .bind(line.line_total)
    .fetch_one(conn)
    .await?;
    Ok(line)
}

/// Fetches a visible (not archived) order.
pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, OrderError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND deleted_at IS NULL")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_lines(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, OrderError> {
    let lines = sqlx::query_as("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY line_no ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn fetch_orders_for_user(user_id: UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 AND deleted_at IS NULL ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves a visible order from `from` to `to`. Returns `None` if the order is missing, archived, or not in `from`.
pub async fn transition(
    order_id: OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4 AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(Utc::now())
    .bind(order_id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn archive(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, OrderError> {
    let now = Utc::now();
    let order = sqlx::query_as(
        "UPDATE orders SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL RETURNING *",
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
