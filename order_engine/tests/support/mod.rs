#![allow(dead_code)]
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use order_engine::{
    db_types::{Coupon, Money, NewCoupon, NewProduct, OrderId, OrderStatusType, PaymentDetails, Product, User, UserId},
    events::{EventHandlers, EventProducers},
    gateway::{
        CircuitBreaker,
        CircuitBreakerConfig,
        GatewayError,
        GatewayReceipt,
        GatewayRequest,
        GatewayTransaction,
        GuardedGateway,
        PaymentProcessor,
        RetryPolicy,
        TransactionStatus,
    },
    settlement_hooks,
    AccountManagement,
    CatalogManagement,
    OrderFlowApi,
    OrderManagement,
    PaymentFlowApi,
    SqliteDatabase,
};

pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let path = std::env::temp_dir().join(format!("order_engine_it_{}.db", rand::random::<u64>()));
    let url = format!("sqlite://{}", path.display());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.migrate().await.expect("Error running migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn seed_user(db: &SqliteDatabase, name: &str, balance: Money) -> User {
    let user = db.create_user(name).await.expect("Error creating user");
    if balance.is_positive() {
        db.charge_balance(user.id, balance).await.expect("Error charging balance");
    }
    user
}

pub async fn seed_product(db: &SqliteDatabase, name: &str, price: Money, stock: i64) -> Product {
    db.insert_product(NewProduct::new(name, price, stock)).await.expect("Error creating product")
}

pub async fn seed_fixed_coupon(db: &SqliteDatabase, owner: UserId, amount: Money) -> Coupon {
    db.issue_coupon(NewCoupon::fixed(owner, amount)).await.expect("Error issuing coupon")
}

pub async fn balance_of(db: &SqliteDatabase, user_id: UserId) -> Money {
    db.fetch_balance(user_id).await.unwrap().expect("user has no balance").amount
}

pub async fn stock_of(db: &SqliteDatabase, product_id: i64) -> i64 {
    db.fetch_active_product(product_id).await.unwrap().expect("product does not exist").stock
}

pub fn card() -> PaymentDetails {
    PaymentDetails::new("SAMSUNG", "1234-5678-9814-1451", "http://localhost:8080/api/v1/payments/callback")
}

/// An in-memory payment processor whose behaviour is set by the test.
#[derive(Clone, Default)]
pub struct ScriptedProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

#[derive(Default)]
struct ProcessorState {
    refuse_requests: bool,
    refuse_lookups: bool,
    requests: Vec<GatewayRequest>,
    transactions: HashMap<String, GatewayTransaction>,
}

impl ScriptedProcessor {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        let processor = Self::default();
        processor.refuse_requests(true);
        processor
    }

    pub fn refuse_requests(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_requests = refuse;
    }

    pub fn refuse_lookups(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_lookups = refuse;
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> Option<GatewayRequest> {
        self.state.lock().unwrap().requests.last().cloned()
    }

    /// Changes how the processor reports the transaction when asked.
    pub fn settle(&self, transaction_key: &str, status: TransactionStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(tx) = state.transactions.get_mut(transaction_key) {
            tx.status = status;
        }
    }

    pub fn transaction(&self, transaction_key: &str) -> Option<GatewayTransaction> {
        self.state.lock().unwrap().transactions.get(transaction_key).cloned()
    }
}

impl PaymentProcessor for ScriptedProcessor {
    async fn request_payment(&self, _user_id: UserId, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if state.refuse_requests {
            return Err(GatewayError::Transport("simulated outage".into()));
        }
        let transaction_key = format!("TX-{}-{}", request.order_id, state.requests.len());
        let tx = GatewayTransaction {
            transaction_key: transaction_key.clone(),
            order_id: request.order_id,
            card_type: request.card_type.clone(),
            card_no: request.card_no.clone(),
            amount: request.amount,
            status: TransactionStatus::Pending,
            reason: None,
        };
        state.transactions.insert(transaction_key.clone(), tx);
        Ok(GatewayReceipt { transaction_key, status: TransactionStatus::Pending, reason: None })
    }

    async fn fetch_transaction(
        &self,
        _user_id: UserId,
        transaction_key: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let state = self.state.lock().unwrap();
        if state.refuse_lookups {
            return Err(GatewayError::Transport("simulated outage".into()));
        }
        state
            .transactions
            .get(transaction_key)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("{transaction_key} not found")))
    }
}

pub fn fast_gateway(processor: ScriptedProcessor) -> GuardedGateway<ScriptedProcessor> {
    let breaker = Arc::new(CircuitBreaker::new("test-gateway", CircuitBreakerConfig::default()));
    GuardedGateway::new(processor, breaker, RetryPolicy::new(3, Duration::from_millis(1)), Duration::from_millis(500))
}

/// Wires up the payment flow the same way the server does: settlement hooks run on their own handlers and the order
/// flow publishes to them.
pub async fn payment_flow(
    db: &SqliteDatabase,
    processor: ScriptedProcessor,
) -> PaymentFlowApi<SqliteDatabase, ScriptedProcessor> {
    let settlement = settlement_hooks(OrderFlowApi::new(db.clone(), EventProducers::default()));
    let handlers = EventHandlers::new(10, settlement);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    PaymentFlowApi::new(OrderFlowApi::new(db.clone(), producers), fast_gateway(processor))
}

/// Polls `check` until it returns true, or panics after 5 seconds.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Timed out waiting for {what}");
}

pub async fn order_status(db: &SqliteDatabase, order_id: OrderId) -> Option<OrderStatusType> {
    db.fetch_order(order_id).await.unwrap().map(|o| o.status)
}
