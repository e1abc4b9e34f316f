//! Inventory reservation.
//!
//! Reservations and restorations are single conditional `UPDATE` statements. They must run inside a write
//! transaction (see [`crate::sqlite::SqliteDatabase`]), which holds the database write lock from the first write
//! until commit, so every product row touched stays exclusive to the order until the unit of work ends.
use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::OrderError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, OrderError> {
    if product.price.is_negative() || product.stock < 0 {
        return Err(OrderError::ValidationError("Price and stock may not be negative".into()));
    }
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (name, price, stock, created_at, updated_at) VALUES ($1, $2, $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_active_product(
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, OrderError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Takes `quantity` units out of stock and returns the product as it is after the reservation. The product's price is
/// the price snapshot for the order line.
pub async fn reserve(
    product_id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, OrderError> {
    let reserved: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET stock = stock - $1, updated_at = $2
            WHERE id = $3 AND deleted_at IS NULL AND stock >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match reserved {
        Some(product) => {
            trace!("🗃️ Reserved {quantity} of product {product_id}. {} left", product.stock);
            Ok(product)
        },
        None => {
            let product = fetch_active_product(product_id, conn)
                .await?
                .ok_or_else(|| OrderError::not_found("Product", product_id))?;
            debug!("🗃️ Cannot reserve {quantity} of product {product_id}. Only {} in stock", product.stock);
            Err(OrderError::InsufficientStock { product_id, requested: quantity, available: product.stock })
        },
    }
}

/// Puts `quantity` units back into stock. Archived products are restocked too, as long as the row exists.
pub async fn restore(
    product_id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, OrderError> {
    let product: Product =
        sqlx::query_as("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(quantity)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| OrderError::not_found("Product", product_id))?;
    trace!("🗃️ Restored {quantity} of product {product_id}. {} in stock", product.stock);
    Ok(product)
}
