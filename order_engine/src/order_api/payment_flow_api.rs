use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewOrder, NewPayment, OrderStatusType, Payment, PaymentDetails, PlacedOrder, UserId},
    events::{PaymentCompletedEvent, PaymentFailedEvent},
    gateway::{GatewayError, GatewayRequest, GuardedGateway, PaymentProcessor, TransactionStatus},
    order_api::{
        order_flow_api::OrderFlowApi,
        order_objects::validate_payment_details,
        payment_objects::{CallbackOutcome, PayOrderRequest, PaymentCallback, FALLBACK_REASON},
    },
    traits::{OrderError, PaymentManagement},
};

const PROCESSOR_FAILED_REASON: &str = "payment was declined by the processor";

/// `PaymentFlowApi` connects orders to the external payment processor.
///
/// * Outbound: a payment request is made once the order (or the payment row) has committed. If the processor cannot
///   be reached, the payment is marked `FAILED` with a retry hint and the call still succeeds. The order stays
///   `PENDING` and can be paid again.
/// * Inbound: processor callbacks are applied at most once per payment. A SUCCESS report is double-checked with the
///   processor before it is believed.
///
/// Confirming or cancelling the order in response to a settled payment happens asynchronously, in the handlers of
/// [`PaymentCompletedEvent`] and [`PaymentFailedEvent`].
pub struct PaymentFlowApi<B, P> {
    orders: OrderFlowApi<B>,
    gateway: GuardedGateway<P>,
}

impl<B, P> Debug for PaymentFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi (circuit {})", self.gateway.breaker().name())
    }
}

impl<B, P> PaymentFlowApi<B, P> {
    pub fn new(orders: OrderFlowApi<B>, gateway: GuardedGateway<P>) -> Self {
        Self { orders, gateway }
    }

    pub fn orders(&self) -> &OrderFlowApi<B> {
        &self.orders
    }

    pub fn gateway(&self) -> &GuardedGateway<P> {
        &self.gateway
    }
}

impl<B, P> PaymentFlowApi<B, P>
where
    B: PaymentManagement,
    P: PaymentProcessor,
{
    /// Creates the order and, if it carries payment details, requests the payment from the processor.
    ///
    /// A processor failure never fails this call. The returned payment is then `FAILED` with no transaction key, and
    /// the order is still `PENDING`.
    pub async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, OrderError> {
        let details = order.payment.clone();
        let mut placed = self.orders.create_order(order).await?;
        if let (Some(payment), Some(details)) = (placed.payment.take(), details) {
            placed.payment = Some(self.initiate(payment, &details).await);
        }
        Ok(placed)
    }

    /// Starts a new payment for an existing `PENDING` order owned by `user_id`.
    ///
    /// The amount must match the order's final total exactly, and the order must not have a payment in flight or
    /// completed already.
    pub async fn pay_order(&self, user_id: UserId, request: PayOrderRequest) -> Result<Payment, OrderError> {
        let PayOrderRequest { order_id, amount, payment: details } = request;
        validate_payment_details(&details)?;
        let order = self.orders.fetch_order_for_user(user_id, order_id).await?;
        if order.status != OrderStatusType::Pending {
            return Err(OrderError::InvalidOrderStatus { order_id, status: order.status });
        }
        if amount != order.final_total {
            return Err(OrderError::ValidationError(format!(
                "Payment amount {amount} does not match the order total of {}",
                order.final_total
            )));
        }
        let payment = self.orders.db().insert_payment(NewPayment::for_order(&order, &details)).await?;
        debug!("💳️ Payment #{} opened for order #{order_id}", payment.id);
        Ok(self.initiate(payment, &details).await)
    }

    /// Sends the payment request. Whatever happens, the caller gets the payment back in its latest known state.
    async fn initiate(&self, payment: Payment, details: &PaymentDetails) -> Payment {
        let request = GatewayRequest {
            order_id: payment.order_id,
            card_type: details.card_type.clone(),
            card_no: details.card_no.clone(),
            amount: payment.amount,
            callback_url: details.callback_url.clone(),
        };
        let receipt = match self.gateway.request_payment(payment.user_id, &request).await {
            Ok(receipt) => receipt,
            Err(e) => return self.fallback(payment, &e).await,
        };
        if receipt.status == TransactionStatus::Failed {
            let reason = receipt.reason.unwrap_or_else(|| PROCESSOR_FAILED_REASON.to_string());
            warn!("💳️ The processor declined payment #{} outright: {reason}", payment.id);
            return self.mark_failed(payment, &reason).await;
        }
        match self.orders.db().assign_transaction_key(payment.id, &receipt.transaction_key).await {
            Ok(Some(updated)) => {
                info!(
                    "💳️ Payment #{} for order #{} accepted by the processor. Transaction key {}",
                    updated.id, updated.order_id, receipt.transaction_key
                );
                updated
            },
            Ok(None) => {
                warn!(
                    "💳️ Payment #{} was settled before transaction key {} could be recorded",
                    payment.id, receipt.transaction_key
                );
                self.latest(payment).await
            },
            Err(e) => {
                error!(
                    "💳️ Could not record transaction key {} for payment #{}. {e}. Callbacks for it will be rejected \
                     until the timeout sweep fails the payment",
                    receipt.transaction_key, payment.id
                );
                payment
            },
        }
    }

    async fn fallback(&self, payment: Payment, cause: &GatewayError) -> Payment {
        warn!("💳️ Payment #{} for order #{} could not be requested. {cause}", payment.id, payment.order_id);
        self.mark_failed(payment, FALLBACK_REASON).await
    }

    async fn mark_failed(&self, payment: Payment, reason: &str) -> Payment {
        match self.orders.db().fail_payment(payment.id, reason).await {
            Ok(Some(failed)) => failed,
            Ok(None) => self.latest(payment).await,
            Err(e) => {
                error!("💳️ Could not mark payment #{} as failed. {e}", payment.id);
                payment
            },
        }
    }

    async fn latest(&self, payment: Payment) -> Payment {
        match self.orders.db().fetch_payment(payment.id).await {
            Ok(Some(latest)) => latest,
            _ => payment,
        }
    }

    /// Applies a processor callback.
    ///
    /// 1. The payment is looked up by transaction key only; the order id in the callback is not trusted.
    /// 2. A payment that is already `COMPLETED` or `FAILED` is left alone: [`CallbackOutcome::Duplicate`].
    /// 3. The callback's order id must match the payment's.
    /// 4. SUCCESS is confirmed with the processor, then the payment is completed and a [`PaymentCompletedEvent`]
    ///    published. FAILED marks the payment failed and publishes a [`PaymentFailedEvent`]. PENDING changes nothing.
    ///
    /// If the processor cannot be asked about a SUCCESS report, [`OrderError::GatewayUnavailable`] is returned so that
    /// the processor delivers the callback again later.
    pub async fn handle_callback(&self, callback: PaymentCallback) -> Result<CallbackOutcome, OrderError> {
        let key = callback.transaction_key.as_str();
        let payment = self
            .orders
            .db()
            .fetch_payment_by_transaction_key(key)
            .await?
            .ok_or_else(|| OrderError::not_found("Payment with transaction key", key))?;
        if payment.status.is_terminal() {
            info!(
                "💳️ Callback {} for payment #{} ignored. The payment is already {}",
                callback.status, payment.id, payment.status
            );
            return Ok(CallbackOutcome::Duplicate);
        }
        if callback.order_id != payment.order_id {
            warn!(
                "💳️ Callback for transaction {key} names order #{}, but the payment belongs to order #{}",
                callback.order_id, payment.order_id
            );
            return Err(OrderError::ValidationError(format!("Transaction {key} does not belong to the given order")));
        }
        match callback.status {
            TransactionStatus::Pending => {
                info!("💳️ Payment #{} is still pending at the processor", payment.id);
                Ok(CallbackOutcome::Pending)
            },
            TransactionStatus::Success => self.complete(payment).await,
            TransactionStatus::Failed => {
                let reason = callback.reason.unwrap_or_else(|| PROCESSOR_FAILED_REASON.to_string());
                self.fail(payment, reason).await
            },
        }
    }

    async fn complete(&self, payment: Payment) -> Result<CallbackOutcome, OrderError> {
        let key = payment.transaction_key.clone().unwrap_or_default();
        let transaction = self.gateway.fetch_transaction(payment.user_id, &key).await.map_err(|e| {
            warn!("💳️ Could not verify transaction {key} with the processor. {e}");
            OrderError::from(e)
        })?;
        if transaction.status != TransactionStatus::Success ||
            transaction.order_id != payment.order_id ||
            transaction.amount != payment.amount
        {
            warn!(
                "💳️ SUCCESS callback for payment #{} does not match the processor's record: status {}, order #{}, \
                 amount {}",
                payment.id, transaction.status, transaction.order_id, transaction.amount
            );
            return Err(OrderError::ValidationError(format!("Transaction {key} could not be verified")));
        }
        match self.orders.db().complete_payment(payment.id, Utc::now()).await? {
            Some(completed) => {
                info!("💳️ Payment #{} for order #{} completed", completed.id, completed.order_id);
                self.orders.producers().publish_payment_completed(PaymentCompletedEvent::new(completed)).await;
                Ok(CallbackOutcome::Completed)
            },
            None => {
                debug!("💳️ Payment #{} was settled by a concurrent callback", payment.id);
                Ok(CallbackOutcome::Duplicate)
            },
        }
    }

    async fn fail(&self, payment: Payment, reason: String) -> Result<CallbackOutcome, OrderError> {
        match self.orders.db().fail_payment(payment.id, &reason).await? {
            Some(failed) => {
                info!("💳️ Payment #{} for order #{} failed: {reason}", failed.id, failed.order_id);
                self.orders.producers().publish_payment_failed(PaymentFailedEvent::new(failed, reason)).await;
                Ok(CallbackOutcome::Failed)
            },
            None => {
                debug!("💳️ Payment #{} was settled by a concurrent callback", payment.id);
                Ok(CallbackOutcome::Duplicate)
            },
        }
    }
}
