use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentId, PaymentStatus},
    traits::OrderError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, OrderError> {
    let now = Utc::now();
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, user_id, amount, card_type, card_no, callback_url, status, created_at,
              updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7, $7)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(payment.amount)
    .bind(payment.card_type)
    .bind(payment.card_no)
    .bind(payment.callback_url)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment(payment_id: PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, OrderError> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_transaction_key(
    transaction_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, OrderError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE transaction_key = $1")
        .bind(transaction_key)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, OrderError> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn assign_transaction_key(
    payment_id: PaymentId,
    transaction_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, OrderError> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET transaction_key = $1, updated_at = $2
            WHERE id = $3 AND status = 'PENDING' AND transaction_key IS NULL
            RETURNING *;
        "#,
    )
    .bind(transaction_key)
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            OrderError::ValidationError(format!("Transaction key {transaction_key} is already assigned"))
        },
        _ => OrderError::from(e),
    })?;
    Ok(payment)
}

/// Moves a `PENDING` payment to `COMPLETED` or `FAILED`. Returns `None` if it had already left `PENDING`.
pub async fn settle(
    payment_id: PaymentId,
    status: PaymentStatus,
    reason: Option<&str>,
    completed_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, OrderError> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = $1, failure_reason = $2, completed_at = $3, updated_at = $4
            WHERE id = $5 AND status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(reason)
    .bind(completed_at)
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_stale_payments(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, OrderError> {
    let payments = sqlx::query_as(
        "SELECT * FROM payments WHERE status = 'PENDING' AND julianday(created_at) < julianday($1) ORDER BY id ASC",
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// Whether the order already has a payment that is in flight or settled.
pub async fn has_open_payment(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, OrderError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = $1 AND status IN ('PENDING', 'COMPLETED')")
            .bind(order_id)
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}
