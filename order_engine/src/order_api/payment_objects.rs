use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, OrderId, PaymentDetails},
    gateway::TransactionStatus,
};

/// Reason recorded on a payment when the processor could not be reached.
pub const FALLBACK_REASON: &str = "payment system did not respond in time; please retry";

/// Reason recorded on a payment that stayed `PENDING` for too long.
pub const TIMEOUT_REASON: &str = "payment timed out";

/// A status notification pushed by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub transaction_key: String,
    /// The processor's view of which order this payment is for
    pub order_id: OrderId,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub card_no: String,
    pub amount: Money,
    pub status: TransactionStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// How a callback was handled. All of these are reported to the processor as a successful receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackOutcome {
    /// The payment is now COMPLETED and the order will be confirmed.
    Completed,
    /// The payment is now FAILED and the order will be cancelled.
    Failed,
    /// The processor is still working on it. Nothing changed.
    Pending,
    /// The payment had already been settled. Nothing changed.
    Duplicate,
}

impl Display for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING",
            Self::Duplicate => "DUPLICATE",
        };
        f.write_str(s)
    }
}

/// A request to pay for an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayOrderRequest {
    pub order_id: OrderId,
    pub amount: Money,
    #[serde(flatten)]
    pub payment: PaymentDetails,
}
