//! Line and order totals.
//!
//! Amounts are exact cents; the only rounding is inside [`Coupon::discount_for`] for percentage coupons. Overflow is
//! reported as a validation error rather than wrapping.
use serde::Serialize;

use crate::{
    db_types::{Coupon, CouponId, Money, NewOrderLine, ProductId},
    traits::OrderError,
};

/// An order line with its price snapshot and discount applied, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub coupon_id: Option<CouponId>,
    pub discount: Money,
    pub line_total: Money,
}

impl PricedLine {
    pub fn new(line: &NewOrderLine, unit_price: Money, coupon: Option<&Coupon>) -> Result<Self, OrderError> {
        let subtotal = unit_price.checked_mul(line.quantity).ok_or_else(|| {
            OrderError::ValidationError(format!("{} × {unit_price} is too large", line.quantity))
        })?;
        let discount = coupon.map(|c| c.discount_for(subtotal)).unwrap_or_default();
        Ok(Self {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
            coupon_id: coupon.map(|c| c.id),
            discount,
            line_total: subtotal - discount,
        })
    }

    pub fn subtotal(&self) -> Money {
        self.line_total + self.discount
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub original_total: Money,
    pub discount_total: Money,
    pub final_total: Money,
}

impl OrderTotals {
    pub fn from_lines(lines: &[PricedLine]) -> Result<Self, OrderError> {
        let overflow = || OrderError::ValidationError("The order total is too large".into());
        let mut totals = Self::default();
        for line in lines {
            totals.original_total = totals.original_total.checked_add(line.subtotal()).ok_or_else(overflow)?;
            totals.discount_total = totals.discount_total.checked_add(line.discount).ok_or_else(overflow)?;
        }
        totals.final_total = totals.original_total - totals.discount_total;
        Ok(totals)
    }
}
