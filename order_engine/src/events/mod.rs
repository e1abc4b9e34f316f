//! Engine events.
//!
//! The payment flow publishes [`PaymentCompletedEvent`] and [`PaymentFailedEvent`]; the settlement hooks react to
//! those by confirming or cancelling the order, which in turn publishes [`OrderConfirmedEvent`] or
//! [`OrderCancelledEvent`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
