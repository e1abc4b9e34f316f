use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewOrder, NewOrderLine, Order, OrderLine, Payment, PaymentDetails, PlacedOrder, UserId, MAX_LINE_QUANTITY},
    traits::OrderError,
};

/// The body of an order creation request. The acting user is supplied separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub payment: Option<PaymentDetails>,
}

impl OrderRequest {
    pub fn into_new_order(self, user_id: UserId) -> NewOrder {
        NewOrder { user_id, lines: self.lines, payment: self.payment }
    }
}

/// Checks the shape of an order before anything is touched:
/// * at least one line,
/// * every quantity in `1..=999`,
/// * a coupon on at most one line,
/// * complete payment details, if any.
pub fn validate_new_order(order: &NewOrder) -> Result<(), OrderError> {
    if order.lines.is_empty() {
        return Err(OrderError::ValidationError("An order must have at least one line".into()));
    }
    let mut coupons = HashSet::new();
    for (i, line) in order.lines.iter().enumerate() {
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(OrderError::ValidationError(format!(
                "Line {}: quantity must be between 1 and {MAX_LINE_QUANTITY}, got {}",
                i + 1,
                line.quantity
            )));
        }
        if let Some(coupon_id) = line.coupon_id {
            if !coupons.insert(coupon_id) {
                return Err(OrderError::ValidationError(format!("Coupon {coupon_id} is applied to more than one line")));
            }
        }
    }
    if let Some(payment) = &order.payment {
        validate_payment_details(payment)?;
    }
    Ok(())
}

pub fn validate_payment_details(details: &PaymentDetails) -> Result<(), OrderError> {
    let missing = [
        ("cardType", details.card_type.as_str()),
        ("cardNo", details.card_no.as_str()),
        ("callbackUrl", details.callback_url.as_str()),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(k, _)| k)
    .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OrderError::ValidationError(format!("Missing payment details: {}", missing.join(", "))))
    }
}

/// What the caller gets back from a successful order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payment: Option<Payment>,
}

impl From<PlacedOrder> for OrderInfo {
    fn from(placed: PlacedOrder) -> Self {
        Self { order: placed.order, lines: placed.lines, payment: placed.payment }
    }
}

/// An order with its lines and every payment attempt made against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payments: Vec<Payment>,
}
