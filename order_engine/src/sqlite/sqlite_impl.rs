//! `SqliteDatabase` is a concrete implementation of an order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! ## Write transactions
//! SQLite allows a single writer at a time. Every mutating unit of work first takes the database's writer gate, an
//! async mutex shared by all clones of a `SqliteDatabase`, and only then begins its transaction. The gate is released
//! when the transaction commits or rolls back. Concurrent writers therefore queue up behind one another instead of
//! failing with `SQLITE_BUSY`, and each unit of work has exclusive ownership of every product and balance row it
//! touches from its first read to its commit. Reads do not take the gate.
//!
//! [`traits`]: crate::traits
use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::db::{balances, coupons, db_url, new_pool, orders, payments, products, run_migrations, users};
use crate::{
    db_types::{
        Balance,
        BalanceHistoryEntry,
        Coupon,
        CouponId,
        Money,
        NewCoupon,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderId,
        OrderLine,
        OrderStatusType,
        Payment,
        PaymentId,
        PaymentStatus,
        PlacedOrder,
        Product,
        ProductId,
        User,
        UserId,
    },
    pricing::{OrderTotals, PricedLine},
    traits::{AccountManagement, CatalogManagement, OrderError, OrderManagement, PaymentManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// A transaction that holds the writer gate until it is committed or rolled back.
pub struct WriteTransaction {
    // Field order matters: the transaction must be dropped (rolled back) before the gate is released.
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

impl WriteTransaction {
    /// Commits on `Ok`, rolls back on `Err`, and hands `result` back to the caller.
    pub async fn finish<T>(self, result: Result<T, OrderError>) -> Result<T, OrderError> {
        match result {
            Ok(value) => {
                self.tx.commit().await?;
                Ok(value)
            },
            Err(e) => {
                if let Err(rollback_err) = self.tx.rollback().await {
                    warn!("🗃️ Rolling back after \"{e}\" failed: {rollback_err}");
                }
                Err(e)
            },
        }
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `ORDERS_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new SQLite connection pool for {url}");
        Ok(Self { url: url.to_string(), pool, writer: Arc::new(Mutex::new(())) })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        run_migrations(&self.pool).await
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    /// Waits for the writer gate, then opens a transaction.
    pub async fn begin_write(&self) -> Result<WriteTransaction, OrderError> {
        let gate = Arc::clone(&self.writer).lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTransaction { tx, _gate: gate })
    }
}

//-------------------------------------------  Units of work  ---------------------------------------------------------

async fn place_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<PlacedOrder, OrderError> {
    let NewOrder { user_id, lines, payment } = order;
    users::fetch_user(user_id, &mut *conn).await?.ok_or_else(|| OrderError::not_found("User", user_id))?;
    // Another user's coupon must be rejected before any stock is touched
    for coupon_id in lines.iter().filter_map(|l| l.coupon_id) {
        coupons::fetch_coupon(coupon_id, &mut *conn)
            .await?
            .filter(|c| c.owner_id == user_id)
            .ok_or_else(|| OrderError::not_found("Coupon", coupon_id))?;
    }
    let mut prices = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products::reserve(line.product_id, line.quantity, &mut *conn).await?;
        prices.push(product.price);
    }
    let mut priced = Vec::with_capacity(lines.len());
    for (line, price) in lines.iter().zip(prices) {
        let coupon = match line.coupon_id {
            Some(coupon_id) => Some(coupons::consume(coupon_id, user_id, &mut *conn).await.map_err(|e| match e {
                OrderError::VersionConflict(id) => OrderError::AlreadyUsed(id),
                e => e,
            })?),
            None => None,
        };
        priced.push(PricedLine::new(line, price, coupon.as_ref())?);
    }
    let totals = OrderTotals::from_lines(&priced)?;
    let order = orders::insert_order(user_id, totals, &mut *conn).await?;
    balances::debit(user_id, totals.final_total, Some(order.id), &mut *conn).await?;
    let mut saved_lines = Vec::with_capacity(priced.len());
    for (line_no, line) in (1..).zip(priced.iter()) {
        saved_lines.push(orders::insert_line(order.id, line_no, line, &mut *conn).await?);
    }
    let payment = match payment {
        Some(details) => Some(payments::insert_payment(NewPayment::for_order(&order, &details), &mut *conn).await?),
        None => None,
    };
    Ok(PlacedOrder { order, lines: saved_lines, payment })
}

async fn confirm(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Order, OrderError> {
    let confirmed =
        orders::transition(order_id, OrderStatusType::Pending, OrderStatusType::Confirmed, &mut *conn).await?;
    match confirmed {
        Some(order) => Ok(order),
        None => Err(rejected_transition(order_id, conn).await),
    }
}

async fn cancel(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Order, OrderError> {
    let order =
        orders::fetch_order(order_id, &mut *conn).await?.ok_or_else(|| OrderError::not_found("Order", order_id))?;
    if order.status == OrderStatusType::Cancelled {
        return Err(OrderError::InvalidOrderStatus { order_id, status: order.status });
    }
    let lines = orders::fetch_order_lines(order_id, &mut *conn).await?;
    for line in &lines {
        products::restore(line.product_id, line.quantity, &mut *conn).await?;
        if let Some(coupon_id) = line.coupon_id {
            coupons::restore(coupon_id, &mut *conn).await?;
        }
    }
    balances::refund(order.user_id, order.final_total, order_id, &mut *conn).await?;
    let cancelled = orders::transition(order_id, order.status, OrderStatusType::Cancelled, &mut *conn).await?;
    match cancelled {
        Some(order) => Ok(order),
        None => Err(rejected_transition(order_id, conn).await),
    }
}

async fn archive(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Order, OrderError> {
    let order =
        orders::fetch_order(order_id, &mut *conn).await?.ok_or_else(|| OrderError::not_found("Order", order_id))?;
    if !order.status.is_terminal() {
        return Err(OrderError::InvalidOrderStatus { order_id, status: order.status });
    }
    orders::archive(order_id, conn).await?.ok_or_else(|| OrderError::not_found("Order", order_id))
}

/// Explains why a conditional status update touched no rows.
async fn rejected_transition(order_id: OrderId, conn: &mut SqliteConnection) -> OrderError {
    match orders::fetch_order(order_id, conn).await {
        Ok(Some(order)) => OrderError::InvalidOrderStatus { order_id, status: order.status },
        Ok(None) => OrderError::not_found("Order", order_id),
        Err(e) => e,
    }
}

async fn open_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, OrderError> {
    let order_id = payment.order_id;
    let order =
        orders::fetch_order(order_id, &mut *conn).await?.ok_or_else(|| OrderError::not_found("Order", order_id))?;
    if order.status != OrderStatusType::Pending {
        return Err(OrderError::InvalidOrderStatus { order_id, status: order.status });
    }
    if payments::has_open_payment(order_id, &mut *conn).await? {
        return Err(OrderError::ValidationError(format!("Order {order_id} already has an open or settled payment")));
    }
    payments::insert_payment(payment, conn).await
}

//-------------------------------------------  Trait impls  -----------------------------------------------------------

impl AccountManagement for SqliteDatabase {
    async fn create_user(&self, name: &str) -> Result<User, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = users::insert_user(name, &mut tx).await;
        tx.finish(result).await
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<Option<User>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn fetch_balance(&self, user_id: UserId) -> Result<Option<Balance>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        balances::fetch_balance(user_id, &mut conn).await
    }

    async fn charge_balance(&self, user_id: UserId, amount: Money) -> Result<Balance, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = balances::charge(user_id, amount, &mut tx).await;
        let balance = tx.finish(result).await?;
        debug!("🗃️ Charged {amount} to user {user_id}. Balance is now {}", balance.amount);
        Ok(balance)
    }

    async fn fetch_balance_history(&self, user_id: UserId) -> Result<Vec<BalanceHistoryEntry>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        balances::fetch_history(user_id, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = products::insert_product(product, &mut tx).await;
        tx.finish(result).await
    }

    async fn fetch_active_product(&self, product_id: ProductId) -> Result<Option<Product>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_active_product(product_id, &mut conn).await
    }

    async fn issue_coupon(&self, coupon: NewCoupon) -> Result<Coupon, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = match users::fetch_user(coupon.owner_id, &mut tx).await {
            Ok(Some(_)) => coupons::insert_coupon(coupon, &mut tx).await,
            Ok(None) => Err(OrderError::not_found("User", coupon.owner_id)),
            Err(e) => Err(e),
        };
        tx.finish(result).await
    }

    async fn fetch_coupon(&self, coupon_id: CouponId) -> Result<Option<Coupon>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        coupons::fetch_coupon(coupon_id, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, OrderError> {
        let user_id = order.user_id;
        let mut tx = self.begin_write().await?;
        let result = place_order(order, &mut tx).await;
        let placed = tx.finish(result).await.map_err(|e| {
            debug!("🗃️ Order for user {user_id} was rolled back. {e}");
            e
        })?;
        debug!("🗃️ Order #{} saved for user {user_id}. Final total {}", placed.order.id, placed.order.final_total);
        Ok(placed)
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_lines(order_id, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }

    async fn confirm_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = confirm(order_id, &mut tx).await;
        let order = tx.finish(result).await?;
        debug!("🗃️ Order #{order_id} confirmed");
        Ok(order)
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = cancel(order_id, &mut tx).await;
        let order = tx.finish(result).await?;
        debug!("🗃️ Order #{order_id} cancelled. {} refunded to user {}", order.final_total, order.user_id);
        Ok(order)
    }

    async fn archive_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = archive(order_id, &mut tx).await;
        tx.finish(result).await
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = open_payment(payment, &mut tx).await;
        tx.finish(result).await
    }

    async fn fetch_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_transaction_key(&self, transaction_key: &str) -> Result<Option<Payment>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_transaction_key(transaction_key, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_order(order_id, &mut conn).await
    }

    async fn assign_transaction_key(
        &self,
        payment_id: PaymentId,
        transaction_key: &str,
    ) -> Result<Option<Payment>, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = payments::assign_transaction_key(payment_id, transaction_key, &mut tx).await;
        tx.finish(result).await
    }

    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Payment>, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = payments::settle(payment_id, PaymentStatus::Completed, None, Some(completed_at), &mut tx).await;
        tx.finish(result).await
    }

    async fn fail_payment(&self, payment_id: PaymentId, reason: &str) -> Result<Option<Payment>, OrderError> {
        let mut tx = self.begin_write().await?;
        let result = payments::settle(payment_id, PaymentStatus::Failed, Some(reason), None, &mut tx).await;
        tx.finish(result).await
    }

    async fn fetch_stale_payments(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_stale_payments(cutoff, &mut conn).await
    }
}
