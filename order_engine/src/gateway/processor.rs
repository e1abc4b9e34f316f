use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::UserId,
    gateway::{GatewayReceipt, GatewayRequest, GatewayTransaction},
    traits::OrderError,
};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize the payment processor client. {0}")]
    Initialization(String),
    #[error("Could not reach the payment processor. {0}")]
    Transport(String),
    #[error("The payment processor did not respond within {0:?}")]
    Timeout(Duration),
    #[error("The payment processor rejected the request. {0}")]
    Rejected(String),
    #[error("The payment processor sent an invalid response. {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker '{0}' is open. The call was not attempted")]
    CallNotPermitted(String),
}

impl From<GatewayError> for OrderError {
    fn from(e: GatewayError) -> Self {
        OrderError::GatewayUnavailable(e.to_string())
    }
}

/// The external payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Asks the processor to charge a card. On success the processor has accepted the request and issued a
    /// transaction key; the final outcome arrives later via callback.
    async fn request_payment(&self, user_id: UserId, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError>;

    /// Looks up a transaction as the processor sees it.
    async fn fetch_transaction(
        &self,
        user_id: UserId,
        transaction_key: &str,
    ) -> Result<GatewayTransaction, GatewayError>;
}
