use thiserror::Error;

use crate::{
    db_types::{CouponId, Money, NewOrder, Order, OrderId, OrderLine, OrderStatusType, PlacedOrder, ProductId, UserId},
    traits::{AccountManagement, CatalogManagement},
};

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Insufficient balance for user {user_id}. Required {required}, but the balance is {available}")]
    InsufficientBalance { user_id: UserId, required: Money, available: Money },
    #[error("Coupon {0} has already been used")]
    AlreadyUsed(CouponId),
    /// A version-checked coupon write lost the race. Mapped to [`OrderError::AlreadyUsed`] before leaving the engine.
    #[error("Coupon {0} was modified by another transaction")]
    VersionConflict(CouponId),
    #[error("Order {order_id} is {status}. The requested transition is not allowed")]
    InvalidOrderStatus { order_id: OrderId, status: OrderStatusType },
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
}

impl OrderError {
    pub fn not_found<T: std::fmt::Display>(entity: &str, id: T) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    /// Storage failures may succeed on a second attempt. Business rule rejections never will.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::DatabaseError(e.to_string())
    }
}

/// The `OrderManagement` trait defines the transactional contract of the order state machine.
///
/// Every mutating method is a single atomic unit of work: either all of its effects on stock, coupons, balances and
/// orders are committed, or none are.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone + AccountManagement + CatalogManagement {
    fn url(&self) -> &str;

    /// Creates an order for `order.user_id`:
    /// 1. Reserves stock for every line, in order, under exclusive access to each product row.
    /// 2. Consumes each line's coupon with a version-checked write and computes the line discount.
    /// 3. Debits the order's final total from the user's balance.
    /// 4. Persists the order (`PENDING`), its lines, and, if payment details were given, a `PENDING` payment.
    ///
    /// Any failure leaves stock, coupons and balances exactly as they were. Input validation is the caller's job; a
    /// version conflict on a coupon is reported as [`OrderError::AlreadyUsed`].
    async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, OrderError>;

    /// Fetches the order with the given id, unless it has been archived.
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderError>;

    async fn fetch_order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, OrderError>;

    /// All visible orders for the user, newest first.
    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError>;

    /// `PENDING` → `CONFIRMED`. Any other current status fails with [`OrderError::InvalidOrderStatus`].
    async fn confirm_order(&self, order_id: OrderId) -> Result<Order, OrderError>;

    /// `PENDING | CONFIRMED` → `CANCELLED`, restoring stock for every line, releasing every consumed coupon and
    /// refunding the final total to the user's balance.
    async fn cancel_order(&self, order_id: OrderId) -> Result<Order, OrderError>;

    /// Soft-deletes an order in a terminal state. The order is invisible to every read and mutation afterwards.
    async fn archive_order(&self, order_id: OrderId) -> Result<Order, OrderError>;
}
