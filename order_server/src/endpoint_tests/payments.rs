use actix_web::{http::StatusCode, test::TestRequest};
use order_engine::{
    db_types::{Money, OrderId, User},
    gateway::{GatewayError, GatewayReceipt, GatewayTransaction, TransactionStatus},
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::{
    helpers::{error_message, get, json, post, prepare_db, seed_product, seed_user, send},
    mocks::MockProcessor,
};

const TX_KEY: &str = "20250816:TR:9577c5";

fn card() -> Value {
    json!({
        "cardType": "SAMSUNG",
        "cardNo": "1234-5678-9814-1451",
        "callbackUrl": "http://localhost:8080/api/v1/payments/callback"
    })
}

fn accepting_processor() -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor.expect_request_payment().times(1).returning(|_, _| {
        Ok(GatewayReceipt { transaction_key: TX_KEY.into(), status: TransactionStatus::Pending, reason: None })
    });
    processor
}

fn processor_reporting(order_id: OrderId, status: TransactionStatus) -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_transaction().withf(|_, key| key == TX_KEY).times(1).returning(move |_, _| {
        Ok(GatewayTransaction {
            transaction_key: TX_KEY.into(),
            order_id,
            card_type: "SAMSUNG".into(),
            card_no: "1234-5678-9814-1451".into(),
            amount: Money::from_units(150),
            status,
            reason: None,
        })
    });
    processor
}

/// Places a 150.00 order with payment details, returning the order id. The processor accepts the payment with
/// transaction key [`TX_KEY`].
async fn paid_order(db: &SqliteDatabase) -> (User, OrderId) {
    let alice = seed_user(db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(db, "mug", Money::from_units(150), 10).await;
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }], "payment": card() });
    let (status, body) = send(db, accepting_processor(), post(alice.id, "/api/v1/orders", body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order_id = json(&body)["id"].as_i64().unwrap();
    (alice, order_id)
}

fn callback(order_id: OrderId, status: &str) -> TestRequest {
    TestRequest::post().uri("/api/v1/payments/callback").set_json(json!({
        "transactionKey": TX_KEY,
        "orderId": order_id,
        "cardType": "SAMSUNG",
        "cardNo": "****-****-****-1451",
        "amount": "150.00",
        "status": status,
        "reason": null
    }))
}

#[actix_web::test]
async fn success_callback_completes_the_payment() {
    let db = prepare_db().await;
    let (alice, order_id) = paid_order(&db).await;

    let processor = processor_reporting(order_id, TransactionStatus::Success);
    let (status, body) = send(&db, processor, callback(order_id, "SUCCESS")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body), json!({ "result": "COMPLETED" }));

    // Redelivery is acknowledged without asking the processor again
    let (status, body) = send(&db, MockProcessor::new(), callback(order_id, "SUCCESS")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({ "result": "DUPLICATE" }));

    let (_, body) = send(&db, MockProcessor::new(), get(alice.id, &format!("/api/v1/orders/{order_id}"))).await;
    let payments = json(&body)["payments"].clone();
    assert_eq!(payments.as_array().unwrap().len(), 1);
    assert_eq!(payments[0]["status"], "COMPLETED");
    assert!(!payments[0]["completedAt"].is_null());
}

#[actix_web::test]
async fn failed_and_pending_callbacks() {
    let db = prepare_db().await;
    let (alice, order_id) = paid_order(&db).await;

    let (status, body) = send(&db, MockProcessor::new(), callback(order_id, "PENDING")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({ "result": "PENDING" }));

    let (status, body) = send(&db, MockProcessor::new(), callback(order_id, "FAILED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({ "result": "FAILED" }));

    let (_, body) = send(&db, MockProcessor::new(), get(alice.id, &format!("/api/v1/orders/{order_id}"))).await;
    assert_eq!(json(&body)["payments"][0]["status"], "FAILED");
}

#[actix_web::test]
async fn suspicious_callbacks_are_rejected() {
    let db = prepare_db().await;
    let (_, order_id) = paid_order(&db).await;

    let unknown = TestRequest::post().uri("/api/v1/payments/callback").set_json(json!({
        "transactionKey": "20250816:TR:000000",
        "orderId": order_id,
        "amount": 150,
        "status": "SUCCESS"
    }));
    let (status, body) = send(&db, MockProcessor::new(), unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, _) = send(&db, MockProcessor::new(), callback(order_id + 1, "FAILED")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The processor has no record of success
    let processor = processor_reporting(order_id, TransactionStatus::Pending);
    let (status, _) = send(&db, processor, callback(order_id, "SUCCESS")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut processor = MockProcessor::new();
    processor
        .expect_fetch_transaction()
        .times(1)
        .returning(|_, _| Err(GatewayError::Transport("connection reset".into())));
    let (status, body) = send(&db, processor, callback(order_id, "SUCCESS")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(error_message(&body).contains("unavailable"));

    let (status, body) = send(&db, MockProcessor::new(), callback(order_id, "PENDING")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({ "result": "PENDING" }), "the payment must still be pending");
}

#[actix_web::test]
async fn pay_an_existing_order() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }] });
    let (_, body) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body)).await;
    let order_id = json(&body)["id"].as_i64().unwrap();

    let payment = |amount: &str| {
        let mut body = card();
        body["orderId"] = json!(order_id);
        body["amount"] = json!(amount);
        body
    };
    let (status, body) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/payments", payment("100.00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("does not match"));

    let (status, body) = send(&db, accepting_processor(), post(alice.id, "/api/v1/payments", payment("150.00"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let paid = json(&body);
    assert_eq!(paid["status"], "PENDING");
    assert_eq!(paid["transactionKey"], TX_KEY);
    assert_eq!(paid["orderId"], order_id);

    let (status, _) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/payments", payment("150.00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
