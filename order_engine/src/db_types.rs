use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use order_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub type UserId = i64;
pub type ProductId = i64;
pub type CouponId = i64;
pub type OrderId = i64;
pub type PaymentId = i64;

/// The largest quantity a single order line may carry.
pub const MAX_LINE_QUANTITY: i64 = 999;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `Display` and `FromStr` for the upper-case text enums that are stored in the database.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $(Self::$variant => $text,)+
                };
                f.write_str(s)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ConversionError::new($kind, s)),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// Stock, coupons and balance have been committed to the order, awaiting confirmation.
    Pending,
    /// Payment has settled. Terminal, but may still be cancelled with full compensation.
    Confirmed,
    /// All side effects of the order have been reversed. Terminal.
    Cancelled,
}

text_enum!(OrderStatusType, "order status", { Pending => "PENDING", Confirmed => "CONFIRMED", Cancelled => "CANCELLED" });

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub original_total: Money,
    pub discount_total: Money,
    pub final_total: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub line_no: i64,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price per unit at the time the order was created.
    pub unit_price: Money,
    pub coupon_id: Option<CouponId>,
    pub discount: Money,
    pub line_total: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        self.line_total + self.discount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub coupon_id: Option<CouponId>,
}

impl NewOrderLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self { product_id, quantity, coupon_id: None }
    }

    pub fn with_coupon(mut self, coupon_id: CouponId) -> Self {
        self.coupon_id = Some(coupon_id);
        self
    }
}

/// Card details for a payment. `card_no` is only ever sent to the processor; it is masked before being stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub card_type: String,
    pub card_no: String,
    pub callback_url: String,
}

impl std::fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_type", &self.card_type)
            .field("card_no", &self.masked_card_no())
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl PaymentDetails {
    pub fn new<S: Into<String>>(card_type: S, card_no: S, callback_url: S) -> Self {
        Self { card_type: card_type.into(), card_no: card_no.into(), callback_url: callback_url.into() }
    }

    /// Replaces every digit except the last four with `*`, keeping separators.
    pub fn masked_card_no(&self) -> String {
        let digits = self.card_no.chars().filter(char::is_ascii_digit).count();
        let mut seen = 0;
        self.card_no
            .chars()
            .map(|c| {
                if c.is_ascii_digit() {
                    seen += 1;
                    if seen + 4 <= digits {
                        return '*';
                    }
                }
                c
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub lines: Vec<NewOrderLine>,
    pub payment: Option<PaymentDetails>,
}

impl NewOrder {
    pub fn new(user_id: UserId, lines: Vec<NewOrderLine>) -> Self {
        Self { user_id, lines, payment: None }
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = Some(payment);
        self
    }
}

/// The result of a committed order creation.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    /// The PENDING payment written alongside the order, if payment details were supplied.
    pub payment: Option<Payment>,
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money, stock: i64) -> Self {
        Self { name: name.into(), price, stock }
    }
}

//--------------------------------------        Coupon        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponKind {
    FixedAmount,
    Percentage,
}

text_enum!(CouponKind, "coupon kind", { FixedAmount => "FIXED_AMOUNT", Percentage => "PERCENTAGE" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponStatus {
    Unused,
    Used,
}

text_enum!(CouponStatus, "coupon status", { Unused => "UNUSED", Used => "USED" });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub owner_id: UserId,
    pub kind: CouponKind,
    /// Cents for fixed-amount coupons, a whole percentage for percentage coupons.
    pub discount: i64,
    pub status: CouponStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// The discount this coupon grants against a line subtotal. Never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let discount = match self.kind {
            CouponKind::FixedAmount => Money::from_cents(self.discount),
            CouponKind::Percentage => subtotal.percentage(self.discount),
        };
        discount.clamp(Money::zero(), subtotal.max(Money::zero()))
    }

    pub fn is_used(&self) -> bool {
        self.status == CouponStatus::Used
    }
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub owner_id: UserId,
    pub kind: CouponKind,
    pub discount: i64,
}

impl NewCoupon {
    pub fn fixed(owner_id: UserId, amount: Money) -> Self {
        Self { owner_id, kind: CouponKind::FixedAmount, discount: amount.cents() }
    }

    pub fn percentage(owner_id: UserId, percent: i64) -> Self {
        Self { owner_id, kind: CouponKind::Percentage, discount: percent }
    }

    pub fn is_valid(&self) -> bool {
        match self.kind {
            CouponKind::FixedAmount => self.discount > 0,
            CouponKind::Percentage => (1..=100).contains(&self.discount),
        }
    }
}

//--------------------------------------   Users & balances   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub user_id: UserId,
    pub amount: Money,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceTxKind {
    Charge,
    Debit,
    Refund,
}

text_enum!(BalanceTxKind, "balance transaction kind", { Charge => "CHARGE", Debit => "DEBIT", Refund => "REFUND" });

/// One row of the append-only balance history. `amount` is signed: debits are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BalanceHistoryEntry {
    pub id: i64,
    pub user_id: UserId,
    pub kind: BalanceTxKind,
    pub amount: Money,
    pub balance_after: Money,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Payment        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

text_enum!(PaymentStatus, "payment status", { Pending => "PENDING", Completed => "COMPLETED", Failed => "FAILED" });

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub card_type: String,
    /// Masked card number
    pub card_no: String,
    pub callback_url: String,
    pub status: PaymentStatus,
    /// Assigned by the processor once it accepts the request
    pub transaction_key: Option<String>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub card_type: String,
    pub card_no: String,
    pub callback_url: String,
}

impl NewPayment {
    /// Builds the row for `order`, masking the card number.
    pub fn for_order(order: &Order, details: &PaymentDetails) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.final_total,
            card_type: details.card_type.clone(),
            card_no: details.masked_card_no(),
            callback_url: details.callback_url.clone(),
        }
    }
}
