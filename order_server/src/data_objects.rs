use order_engine::{db_types::Money, payment_objects::CallbackOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Money,
}

/// The acknowledgement sent back to the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub result: CallbackOutcome,
}
