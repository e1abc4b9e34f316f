//! Event hooks that settle orders once their payment is decided.
//!
//! * [`PaymentCompletedEvent`] confirms the order.
//! * [`PaymentFailedEvent`] cancels the order, with full compensation.
//!
//! Each runs in its own unit of work, after the payment update has committed. Storage errors are retried a few times;
//! a rejected transition means the order was already moved on by someone else, and is only logged.
use std::{future::Future, sync::Arc, time::Duration};

use log::*;

use crate::{
    db_types::{Order, OrderId},
    events::EventHooks,
    order_api::order_flow_api::OrderFlowApi,
    traits::OrderError,
    SqliteDatabase,
};

pub const SETTLEMENT_ATTEMPTS: u32 = 3;
pub const SETTLEMENT_RETRY_WAIT: Duration = Duration::from_millis(250);

pub fn settlement_hooks(api: OrderFlowApi<SqliteDatabase>) -> EventHooks {
    let api = Arc::new(api);
    let mut hooks = EventHooks::default();
    let confirm_api = Arc::clone(&api);
    hooks.on_payment_completed(move |ev| {
        let api = Arc::clone(&confirm_api);
        Box::pin(async move {
            let order_id = ev.payment.order_id;
            settle("confirm", order_id, || api.confirm_order(order_id)).await;
        })
    });
    let cancel_api = Arc::clone(&api);
    hooks.on_payment_failed(move |ev| {
        let api = Arc::clone(&cancel_api);
        Box::pin(async move {
            let order_id = ev.payment.order_id;
            debug!("📬️ Payment #{} failed ({}). Cancelling order #{order_id}", ev.payment.id, ev.reason);
            settle("cancel", order_id, || api.cancel_order(order_id)).await;
        })
    });
    hooks
}

async fn settle<F, Fut>(action: &str, order_id: OrderId, mut f: F) -> Option<Order>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Order, OrderError>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(order) => {
                debug!("📬️ Settlement: {action} order #{order_id} succeeded");
                return Some(order);
            },
            Err(e) if e.is_transient() && attempt < SETTLEMENT_ATTEMPTS => {
                warn!("📬️ Settlement: {action} order #{order_id} failed (attempt {attempt}). {e}. Retrying.");
                attempt += 1;
                tokio::time::sleep(SETTLEMENT_RETRY_WAIT).await;
            },
            Err(OrderError::InvalidOrderStatus { status, .. }) => {
                info!("📬️ Settlement: order #{order_id} is already {status}. Nothing to {action}.");
                return None;
            },
            Err(e) => {
                error!("📬️ Settlement: could not {action} order #{order_id}. {e}");
                return None;
            },
        }
    }
}
