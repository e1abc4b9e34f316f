use std::time::Duration;

use log::*;
use order_engine::{db_types::Payment, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the payment timeout worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, `PENDING` payments older than `timeout` are failed. Each one publishes a payment-failed event,
/// which cancels its order.
pub fn start_payment_timeout_worker(
    api: OrderFlowApi<SqliteDatabase>,
    interval: Duration,
    timeout: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Payment timeout worker started. Payments time out after {} min", timeout.num_minutes());
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment timeout job");
            match api.expire_stale_payments(timeout).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No stale payments"),
                Ok(expired) => {
                    info!("🕰️ {} payments timed out", expired.len());
                    debug!("🕰️ Timed out payments: {}", payment_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment timeout job: {e}");
                },
            }
        }
    })
}

fn payment_list(payments: &[Payment]) -> String {
    payments
        .iter()
        .map(|p| format!("[{}] order #{} amount {}", p.id, p.order_id, p.amount))
        .collect::<Vec<String>>()
        .join(", ")
}
