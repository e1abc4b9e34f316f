use std::{future::Future, sync::Arc, time::Duration};

use log::*;
use order_common::Secret;

use crate::{
    db_types::UserId,
    gateway::{
        CircuitBreaker,
        CircuitBreakerConfig,
        CircuitBreakerRegistry,
        CircuitState,
        GatewayError,
        GatewayReceipt,
        GatewayRequest,
        GatewayTransaction,
        PaymentProcessor,
        RetryPolicy,
    },
};

/// Registry name of the breaker that guards the payment processor.
pub const PAYMENT_GATEWAY_BREAKER: &str = "payment-gateway";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Caller-side timeout applied to every individual attempt
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082".to_string(),
            api_key: Secret::default(),
            call_timeout: Duration::from_millis(3000),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// A [`PaymentProcessor`] wrapped in a per-attempt timeout, a retry policy and a circuit breaker.
///
/// The breaker sees one outcome per logical call: three failed attempts inside the retry count as a single failure.
pub struct GuardedGateway<P> {
    processor: Arc<P>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl<P> Clone for GuardedGateway<P> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            breaker: Arc::clone(&self.breaker),
            retry: self.retry,
            call_timeout: self.call_timeout,
        }
    }
}

impl<P> GuardedGateway<P> {
    pub fn processor(&self) -> &P {
        self.processor.as_ref()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        self.breaker.as_ref()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

impl<P> GuardedGateway<P>
where P: PaymentProcessor
{
    pub fn new(processor: P, breaker: Arc<CircuitBreaker>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self { processor: Arc::new(processor), breaker, retry, call_timeout }
    }

    /// Builds a gateway that shares the [`PAYMENT_GATEWAY_BREAKER`] breaker from `registry`.
    pub fn from_config(processor: P, config: &GatewayConfig, registry: &CircuitBreakerRegistry) -> Self {
        let breaker = registry.breaker(PAYMENT_GATEWAY_BREAKER, config.breaker);
        Self::new(processor, breaker, config.retry, config.call_timeout)
    }

    pub async fn request_payment(
        &self,
        user_id: UserId,
        request: &GatewayRequest,
    ) -> Result<GatewayReceipt, GatewayError> {
        trace!("💳️ Requesting payment for order #{} ({})", request.order_id, request.amount);
        self.breaker
            .call(move || self.retry.run(move || self.attempt(self.processor.request_payment(user_id, request))))
            .await
    }

    pub async fn fetch_transaction(
        &self,
        user_id: UserId,
        transaction_key: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        trace!("💳️ Fetching transaction {transaction_key} from the payment processor");
        self.breaker
            .call(move || {
                self.retry.run(move || self.attempt(self.processor.fetch_transaction(user_id, transaction_key)))
            })
            .await
    }

    async fn attempt<T, F>(&self, call: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, GatewayError>> {
        tokio::time::timeout(self.call_timeout, call).await.map_err(|_| GatewayError::Timeout(self.call_timeout))?
    }
}
