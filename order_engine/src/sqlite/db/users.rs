use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{User, UserId},
    traits::OrderError,
};

/// Inserts the user together with an empty balance row.
pub async fn insert_user(name: &str, conn: &mut SqliteConnection) -> Result<User, OrderError> {
    let now = Utc::now();
    let user: User = sqlx::query_as("INSERT INTO users (name, created_at) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                OrderError::ValidationError(format!("A user named {name} already exists"))
            },
            _ => OrderError::from(e),
        })?;
    sqlx::query("INSERT INTO balances (user_id, amount, updated_at) VALUES ($1, 0, $2)")
        .bind(user.id)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: UserId, conn: &mut SqliteConnection) -> Result<Option<User>, OrderError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}
