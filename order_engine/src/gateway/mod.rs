//! # Payment gateway client
//!
//! Outbound calls to the external payment processor. The processor is abstracted behind [`PaymentProcessor`] so that
//! it can be replaced in tests; [`HttpPaymentProcessor`] is the production implementation.
//!
//! Every call the order flow makes goes through a [`GuardedGateway`], which layers, from the inside out:
//! * a caller-side timeout on each attempt,
//! * a bounded [`RetryPolicy`] with fixed spacing between attempts,
//! * a [`CircuitBreaker`] that records one outcome per logical call and rejects calls outright while it is open.
//!
//! The gateway itself has no fallback. Deciding what a failed call means for a payment is up to
//! [`crate::PaymentFlowApi`].
mod circuit_breaker;
mod gateway_objects;
mod guarded;
mod http_client;
mod processor;
mod retry;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use gateway_objects::{ApiResponse, GatewayReceipt, GatewayRequest, GatewayTransaction, ResponseMeta, ResultType, TransactionStatus};
pub use guarded::{GatewayConfig, GuardedGateway, PAYMENT_GATEWAY_BREAKER};
pub use http_client::HttpPaymentProcessor;
pub use processor::{GatewayError, PaymentProcessor};
pub use retry::RetryPolicy;
