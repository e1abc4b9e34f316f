use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment};

/// A payment callback reported SUCCESS, the processor confirmed it, and the payment is now `COMPLETED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub payment: Payment,
}

impl PaymentCompletedEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// The payment is now `FAILED`, either because the processor said so or because it timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub payment: Payment,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new<S: Into<String>>(payment: Payment, reason: S) -> Self {
        Self { payment, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The order was cancelled and fully compensated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PaymentCompleted(PaymentCompletedEvent),
    PaymentFailed(PaymentFailedEvent),
    OrderConfirmed(OrderConfirmedEvent),
    OrderCancelled(OrderCancelledEvent),
}
