use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentId},
    traits::{OrderError, OrderManagement},
};

/// Payment bookkeeping. The processor integration itself lives in [`crate::gateway`].
///
/// The status-changing methods return `Ok(None)` when the payment had already left `PENDING`; callers treat that as
/// a duplicate and do nothing further.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: OrderManagement {
    /// Opens a `PENDING` payment against an existing order. The order must be visible and `PENDING` and must not
    /// already have a `PENDING` or `COMPLETED` payment.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, OrderError>;

    async fn fetch_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>, OrderError>;

    async fn fetch_payment_by_transaction_key(&self, transaction_key: &str) -> Result<Option<Payment>, OrderError>;

    async fn fetch_payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, OrderError>;

    /// Records the processor's transaction key on a `PENDING` payment that does not have one yet.
    async fn assign_transaction_key(
        &self,
        payment_id: PaymentId,
        transaction_key: &str,
    ) -> Result<Option<Payment>, OrderError>;

    /// `PENDING` → `COMPLETED`, stamping the completion time.
    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Payment>, OrderError>;

    /// `PENDING` → `FAILED` with the given reason.
    async fn fail_payment(&self, payment_id: PaymentId, reason: &str) -> Result<Option<Payment>, OrderError>;

    /// `PENDING` payments created before `cutoff`.
    async fn fetch_stale_payments(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>, OrderError>;
}
