use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, Payment, PlacedOrder, UserId},
    events::{EventProducers, OrderCancelledEvent, OrderConfirmedEvent, PaymentFailedEvent},
    order_api::{
        order_objects::{validate_new_order, OrderDetails},
        payment_objects::TIMEOUT_REASON,
    },
    traits::{OrderError, OrderManagement, PaymentManagement},
};

/// `OrderFlowApi` drives the order state machine: creation, confirmation, cancellation and archival.
///
/// Every state change it makes is published to the registered event hooks once the change has committed.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Validates and creates a new order. Stock, coupons and balance are committed together or not at all.
    ///
    /// If the order carries payment details, a `PENDING` payment is written with it, but the processor is not
    /// contacted. Use [`crate::PaymentFlowApi::place_order`] for that.
    pub async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, OrderError> {
        validate_new_order(&order)?;
        let user_id = order.user_id;
        trace!("🔄️📦️ Creating order with {} lines for user #{user_id}", order.lines.len());
        let placed = self.db.create_order(order).await?;
        info!(
            "🔄️📦️ Order #{} created for user #{user_id}. Original {}, discount {}, final {}",
            placed.order.id, placed.order.original_total, placed.order.discount_total, placed.order.final_total
        );
        Ok(placed)
    }

    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    /// Fetches the order if it belongs to `user_id`. Someone else's order is reported as not found.
    pub async fn fetch_order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    pub async fn confirm_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.db.confirm_order(order_id).await?;
        info!("🔄️✅️ Order #{order_id} confirmed");
        self.call_order_confirmed_hook(&order).await;
        Ok(order)
    }

    /// Cancels the order, returning its stock, coupons and final total to where they came from.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.db.cancel_order(order_id).await?;
        info!("🔄️❌️ Order #{order_id} cancelled. {} refunded to user #{}", order.final_total, order.user_id);
        self.call_order_cancelled_hook(&order).await;
        Ok(order)
    }

    pub async fn confirm_order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.fetch_order_for_user(user_id, order_id).await?;
        self.confirm_order(order_id).await
    }

    pub async fn cancel_order_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.fetch_order_for_user(user_id, order_id).await?;
        self.cancel_order(order_id).await
    }

    /// Hides a confirmed or cancelled order from every read and write path.
    pub async fn archive_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.db.archive_order(order_id).await?;
        info!("🔄️🗑️ Order #{order_id} archived");
        Ok(order)
    }

    async fn call_order_confirmed_hook(&self, order: &Order) {
        if !self.producers.order_confirmed_producer.is_empty() {
            debug!("🔄️✅️ Notifying order confirmed hook subscribers");
            self.producers.publish_order_confirmed(OrderConfirmedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_cancelled_hook(&self, order: &Order) {
        if !self.producers.order_cancelled_producer.is_empty() {
            debug!("🔄️❌️ Notifying order cancelled hook subscribers");
            self.producers.publish_order_cancelled(OrderCancelledEvent::new(order.clone())).await;
        }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentManagement
{
    pub async fn order_details_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<OrderDetails, OrderError> {
        let order = self.fetch_order_for_user(user_id, order_id).await?;
        let lines = self.db.fetch_order_lines(order_id).await?;
        let payments = self.db.fetch_payments_for_order(order_id).await?;
        Ok(OrderDetails { order, lines, payments })
    }

    /// Fails every payment that has been `PENDING` for longer than `timeout` and publishes a payment failed event for
    /// each, which in turn cancels its order.
    ///
    /// Returns the payments that were failed by this sweep. Payments settled concurrently are skipped.
    pub async fn expire_stale_payments(&self, timeout: chrono::Duration) -> Result<Vec<Payment>, OrderError> {
        let cutoff = Utc::now() - timeout;
        let stale = self.db.fetch_stale_payments(cutoff).await?;
        if stale.is_empty() {
            trace!("🔄️⏰️ No stale payments");
            return Ok(stale);
        }
        debug!("🔄️⏰️ {} payments have been pending since before {cutoff}", stale.len());
        let mut expired = Vec::with_capacity(stale.len());
        for payment in stale {
            match self.db.fail_payment(payment.id, TIMEOUT_REASON).await? {
                Some(failed) => {
                    info!("🔄️⏰️ Payment #{} for order #{} timed out", failed.id, failed.order_id);
                    self.producers.publish_payment_failed(PaymentFailedEvent::new(failed.clone(), TIMEOUT_REASON)).await;
                    expired.push(failed);
                },
                None => debug!("🔄️⏰️ Payment #{} was settled before it could be timed out", payment.id),
            }
        }
        Ok(expired)
    }
}
