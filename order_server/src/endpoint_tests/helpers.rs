use std::{sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use order_engine::{
    db_types::{Money, NewProduct, Product, User, UserId},
    events::EventProducers,
    gateway::{CircuitBreaker, CircuitBreakerConfig, GuardedGateway, RetryPolicy},
    test_utils::{prepare_test_env, random_db_path},
    AccountApi,
    AccountManagement,
    CatalogManagement,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};
use serde_json::Value;

use super::mocks::MockProcessor;
use crate::{
    auth::USER_ID_HEADER,
    routes::{
        health,
        CancelOrderRoute,
        ChargePointsRoute,
        ConfirmOrderRoute,
        MyOrdersRoute,
        MyPointsRoute,
        OrderByIdRoute,
        PayOrderRoute,
        PaymentCallbackRoute,
        PlaceOrderRoute,
    },
    server::{json_config, path_config},
};

pub async fn prepare_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
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

/// Builds the `/api/v1` routes over `db`, with `processor` standing in for the payment processor, and sends `req`.
///
/// The gateway makes a single attempt per call so that mock expectations can count calls exactly.
pub async fn send(db: &SqliteDatabase, processor: MockProcessor, req: TestRequest) -> (StatusCode, String) {
    let breaker = Arc::new(CircuitBreaker::new("endpoint-tests", CircuitBreakerConfig::default()));
    let gateway = GuardedGateway::new(processor, breaker, RetryPolicy::no_retry(), Duration::from_millis(500));
    let orders_api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let payments_api = PaymentFlowApi::new(orders_api.clone(), gateway);
    let accounts_api = AccountApi::new(db.clone());
    let app = App::new()
        .app_data(json_config())
        .app_data(path_config())
        .app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(payments_api))
        .app_data(web::Data::new(accounts_api))
        .service(health)
        .service(
            web::scope("/api/v1")
                .service(PlaceOrderRoute::<SqliteDatabase, MockProcessor>::new())
                .service(MyOrdersRoute::<SqliteDatabase>::new())
                .service(OrderByIdRoute::<SqliteDatabase>::new())
                .service(ConfirmOrderRoute::<SqliteDatabase>::new())
                .service(CancelOrderRoute::<SqliteDatabase>::new())
                .service(PaymentCallbackRoute::<SqliteDatabase, MockProcessor>::new())
                .service(PayOrderRoute::<SqliteDatabase, MockProcessor>::new())
                .service(ChargePointsRoute::<SqliteDatabase>::new())
                .service(MyPointsRoute::<SqliteDatabase>::new()),
        );
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn get(user_id: UserId, path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header((USER_ID_HEADER, user_id.to_string()))
}

pub fn post(user_id: UserId, path: &str, body: Value) -> TestRequest {
    TestRequest::post().uri(path).insert_header((USER_ID_HEADER, user_id.to_string())).set_json(body)
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}

/// The `error` message of an error response.
pub fn error_message(body: &str) -> String {
    json(body)["error"].as_str().expect("error responses carry an error message").to_string()
}
