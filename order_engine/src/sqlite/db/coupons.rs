//! Coupon guard.
//!
//! Coupon state changes are compare-and-swap writes on the `version` column. A writer that read a stale version
//! updates zero rows and gets [`OrderError::VersionConflict`].
use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Coupon, CouponId, CouponStatus, NewCoupon, UserId},
    traits::OrderError,
};

pub async fn insert_coupon(coupon: NewCoupon, conn: &mut SqliteConnection) -> Result<Coupon, OrderError> {
    if !coupon.is_valid() {
        return Err(OrderError::ValidationError(format!(
            "{} is not a valid discount for a {} coupon",
            coupon.discount, coupon.kind
        )));
    }
    let now = Utc::now();
    let coupon = sqlx::query_as(
        r#"
            INSERT INTO coupons (owner_id, kind, discount, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, 'UNUSED', 0, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(coupon.owner_id)
    .bind(coupon.kind)
    .bind(coupon.discount)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(coupon)
}

pub async fn fetch_coupon(coupon_id: CouponId, conn: &mut SqliteConnection) -> Result<Option<Coupon>, OrderError> {
    let coupon = sqlx::query_as("SELECT * FROM coupons WHERE id = $1").bind(coupon_id).fetch_optional(conn).await?;
    Ok(coupon)
}

/// Marks the coupon as used on behalf of `owner_id` and returns it in its used state.
///
/// A coupon that belongs to someone else is reported as missing, so that its existence is not leaked.
pub async fn consume(
    coupon_id: CouponId,
    owner_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Coupon, OrderError> {
    let coupon = fetch_coupon(coupon_id, &mut *conn)
        .await?
        .filter(|c| c.owner_id == owner_id)
        .ok_or_else(|| OrderError::not_found("Coupon", coupon_id))?;
    if coupon.is_used() {
        return Err(OrderError::AlreadyUsed(coupon_id));
    }
    let coupon = swap_status(&coupon, CouponStatus::Used, conn).await?;
    trace!("🗃️ Coupon {coupon_id} consumed by user {owner_id}");
    Ok(coupon)
}

/// Releases a used coupon so that it can be spent again. Releasing an unused coupon is a no-op.
pub async fn restore(coupon_id: CouponId, conn: &mut SqliteConnection) -> Result<Coupon, OrderError> {
    let coupon =
        fetch_coupon(coupon_id, &mut *conn).await?.ok_or_else(|| OrderError::not_found("Coupon", coupon_id))?;
    if !coupon.is_used() {
        warn!("🗃️ Coupon {coupon_id} was asked to be restored, but it is not in use");
        return Ok(coupon);
    }
    let coupon = swap_status(&coupon, CouponStatus::Unused, conn).await?;
    trace!("🗃️ Coupon {coupon_id} restored");
    Ok(coupon)
}

async fn swap_status(
    coupon: &Coupon,
    status: CouponStatus,
    conn: &mut SqliteConnection,
) -> Result<Coupon, OrderError> {
    let updated = sqlx::query_as(
        r#"
            UPDATE coupons SET status = $1, version = version + 1, updated_at = $2
            WHERE id = $3 AND version = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(Utc::now())
    .bind(coupon.id)
    .bind(coupon.version)
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| {
        debug!("🗃️ Version {} of coupon {} is stale", coupon.version, coupon.id);
        OrderError::VersionConflict(coupon.id)
    })
}
