//! Prepaid balance ledger.
//!
//! The running balance lives in `balances`; every change appends an immutable row to `balance_history` carrying the
//! balance after the change. A debit is a conditional update, so the balance can never go negative no matter how
//! callers interleave.
use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Balance, BalanceHistoryEntry, BalanceTxKind, Money, OrderId, UserId},
    traits::OrderError,
};

pub async fn fetch_balance(user_id: UserId, conn: &mut SqliteConnection) -> Result<Option<Balance>, OrderError> {
    let balance =
        sqlx::query_as("SELECT * FROM balances WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(balance)
}

/// Deducts `amount` from the user's balance and appends a `DEBIT` record.
pub async fn debit(
    user_id: UserId,
    amount: Money,
    order_id: Option<OrderId>,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderError> {
    if amount.is_negative() {
        return Err(OrderError::ValidationError(format!("Cannot debit a negative amount ({amount})")));
    }
    let updated: Option<Balance> = sqlx::query_as(
        r#"
            UPDATE balances SET amount = amount - $1, updated_at = $2
            WHERE user_id = $3 AND amount >= $1
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    let balance = match updated {
        Some(b) => b,
        None => {
            let current = fetch_balance(user_id, conn)
                .await?
                .ok_or_else(|| OrderError::not_found("Balance for user", user_id))?;
            debug!("🗃️ User {user_id} cannot cover a debit of {amount}. Balance is {}", current.amount);
            return Err(OrderError::InsufficientBalance { user_id, required: amount, available: current.amount });
        },
    };
    append_history(user_id, BalanceTxKind::Debit, -amount, balance.amount, order_id, conn).await?;
    trace!("🗃️ Debited {amount} from user {user_id}. Balance is now {}", balance.amount);
    Ok(balance)
}

/// Returns `amount` to the user's balance and appends a `REFUND` record.
pub async fn refund(
    user_id: UserId,
    amount: Money,
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderError> {
    credit(user_id, BalanceTxKind::Refund, amount, Some(order_id), conn).await
}

/// Tops up the user's balance and appends a `CHARGE` record.
pub async fn charge(user_id: UserId, amount: Money, conn: &mut SqliteConnection) -> Result<Balance, OrderError> {
    if !amount.is_positive() {
        return Err(OrderError::ValidationError(format!("A charge must be positive, but was {amount}")));
    }
    credit(user_id, BalanceTxKind::Charge, amount, None, conn).await
}

async fn credit(
    user_id: UserId,
    kind: BalanceTxKind,
    amount: Money,
    order_id: Option<OrderId>,
    conn: &mut SqliteConnection,
) -> Result<Balance, OrderError> {
    if amount.is_negative() {
        return Err(OrderError::ValidationError(format!("Cannot credit a negative amount ({amount})")));
    }
    let updated: Option<Balance> = sqlx::query_as(
        r#"
            UPDATE balances SET amount = amount + $1, updated_at = $2
            WHERE user_id = $3 AND amount <= 9223372036854775807 - $1
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    let balance = match updated {
        Some(b) => b,
        None => {
            let current = fetch_balance(user_id, conn)
                .await?
                .ok_or_else(|| OrderError::not_found("Balance for user", user_id))?;
            debug!("🗃️ A {kind} of {amount} would overflow the balance of user {user_id} ({})", current.amount);
            return Err(OrderError::ValidationError(format!(
                "A {kind} of {amount} would take the balance beyond the largest supported amount"
            )));
        },
    };
    append_history(user_id, kind, amount, balance.amount, order_id, conn).await?;
    trace!("🗃️ {kind} of {amount} for user {user_id}. Balance is now {}", balance.amount);
    Ok(balance)
}

async fn append_history(
    user_id: UserId,
    kind: BalanceTxKind,
    amount: Money,
    balance_after: Money,
    order_id: Option<OrderId>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderError> {
    sqlx::query(
        r#"
            INSERT INTO balance_history (user_id, kind, amount, balance_after, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .bind(balance_after)
    .bind(order_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_history(
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<BalanceHistoryEntry>, OrderError> {
    let history = sqlx::query_as("SELECT * FROM balance_history WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(history)
}
