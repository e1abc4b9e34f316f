use actix_web::{http::StatusCode, test::TestRequest};
use order_engine::{
    db_types::Money,
    gateway::{GatewayError, GatewayReceipt, TransactionStatus},
    payment_objects::FALLBACK_REASON,
};
use serde_json::json;

use super::{
    helpers::{error_message, get, json, post, prepare_db, seed_product, seed_user, send},
    mocks::MockProcessor,
};

fn card() -> serde_json::Value {
    json!({
        "cardType": "SAMSUNG",
        "cardNo": "1234-5678-9814-1451",
        "callbackUrl": "http://localhost:8080/api/v1/payments/callback"
    })
}

#[actix_web::test]
async fn health_check() {
    let db = prepare_db().await;
    let (status, body) = send(&db, MockProcessor::new(), TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn place_order_without_payment() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;

    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 2 }] });
    let (status, body) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = json(&body);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["userId"], alice.id);
    assert_eq!(order["originalTotal"], "300.00");
    assert_eq!(order["finalTotal"], "300.00");
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);
    assert!(order["payment"].is_null());

    let (status, body) = send(&db, MockProcessor::new(), get(alice.id, "/api/v1/points")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["balance"]["amount"], "700.00");
}

#[actix_web::test]
async fn place_order_requests_payment() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;

    let mut processor = MockProcessor::new();
    processor
        .expect_request_payment()
        .withf(|_, req| req.card_no == "1234-5678-9814-1451" && req.amount == Money::from_units(150))
        .times(1)
        .returning(|_, _| {
            Ok(GatewayReceipt {
                transaction_key: "20250816:TR:9577c5".into(),
                status: TransactionStatus::Pending,
                reason: None,
            })
        });
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }], "payment": card() });
    let (status, body) = send(&db, processor, post(alice.id, "/api/v1/orders", body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = json(&body);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment"]["status"], "PENDING");
    assert_eq!(order["payment"]["transactionKey"], "20250816:TR:9577c5");
    assert_eq!(order["payment"]["amount"], "150.00");
    assert_eq!(order["payment"]["cardNo"], "****-****-****-1451");
}

#[actix_web::test]
async fn processor_outage_still_places_the_order() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;

    let mut processor = MockProcessor::new();
    processor
        .expect_request_payment()
        .times(1)
        .returning(|_, _| Err(GatewayError::Transport("connection refused".into())));
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }], "payment": card() });
    let (status, body) = send(&db, processor, post(alice.id, "/api/v1/orders", body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = json(&body);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment"]["status"], "FAILED");
    assert_eq!(order["payment"]["failureReason"], FALLBACK_REASON);
    assert!(order["payment"]["transactionKey"].is_null());
}

#[actix_web::test]
async fn missing_user_header_is_a_bad_request() {
    let db = prepare_db().await;
    let req = TestRequest::get().uri("/api/v1/orders");
    let (status, body) = send(&db, MockProcessor::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("X-USER-ID"));

    let req = TestRequest::get().uri("/api/v1/orders").insert_header(("X-USER-ID", "alice"));
    let (status, _) = send(&db, MockProcessor::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_creation_errors() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(100)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 1).await;

    // Malformed body
    let req = TestRequest::post()
        .uri("/api/v1/orders")
        .insert_header(("X-USER-ID", alice.id.to_string()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"lines\": [");
    let (status, body) = send(&db, MockProcessor::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!error_message(&body).is_empty());

    let cases = [
        (json!({ "lines": [] }), StatusCode::BAD_REQUEST),
        (json!({ "lines": [{ "productId": mug.id, "quantity": 0 }] }), StatusCode::BAD_REQUEST),
        (json!({ "lines": [{ "productId": 9999, "quantity": 1 }] }), StatusCode::NOT_FOUND),
        (json!({ "lines": [{ "productId": mug.id, "quantity": 2 }] }), StatusCode::CONFLICT),
        (json!({ "lines": [{ "productId": mug.id, "quantity": 1 }] }), StatusCode::CONFLICT),
        (
            json!({ "lines": [{ "productId": mug.id, "quantity": 1 }], "payment": { "cardType": "", "cardNo": "", "callbackUrl": "" } }),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (body, expected) in cases {
        let (status, response) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body.clone())).await;
        assert_eq!(status, expected, "{body} gave {response}");
        assert!(!error_message(&response).is_empty());
    }
}

#[actix_web::test]
async fn orders_are_scoped_to_their_owner() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let bob = seed_user(&db, "bob", Money::zero()).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }] });
    let (_, body) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body)).await;
    let order_id = json(&body)["id"].as_i64().unwrap();

    let path = format!("/api/v1/orders/{order_id}");
    let (status, body) = send(&db, MockProcessor::new(), get(alice.id, &path)).await;
    assert_eq!(status, StatusCode::OK);
    let details = json(&body);
    assert_eq!(details["id"], order_id);
    assert_eq!(details["lines"].as_array().unwrap().len(), 1);
    assert_eq!(details["payments"], json!([]));

    let (status, _) = send(&db, MockProcessor::new(), get(bob.id, &path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&db, MockProcessor::new(), post(bob.id, &format!("{path}/cancel"), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&db, MockProcessor::new(), get(alice.id, "/api/v1/orders")).await;
    assert_eq!(json(&body).as_array().unwrap().len(), 1);
    let (_, body) = send(&db, MockProcessor::new(), get(bob.id, "/api/v1/orders")).await;
    assert_eq!(json(&body), json!([]));

    let (status, _) = send(&db, MockProcessor::new(), get(alice.id, "/api/v1/orders/not-a-number")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn confirm_and_cancel() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let mug = seed_product(&db, "mug", Money::from_units(150), 10).await;
    let body = json!({ "lines": [{ "productId": mug.id, "quantity": 1 }] });
    let (_, first) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body.clone())).await;
    let (_, second) = send(&db, MockProcessor::new(), post(alice.id, "/api/v1/orders", body)).await;
    let first = json(&first)["id"].as_i64().unwrap();
    let second = json(&second)["id"].as_i64().unwrap();

    let (status, body) =
        send(&db, MockProcessor::new(), post(alice.id, &format!("/api/v1/orders/{first}/confirm"), json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["status"], "CONFIRMED");

    let cancel = format!("/api/v1/orders/{second}/cancel");
    let (status, body) = send(&db, MockProcessor::new(), post(alice.id, &cancel, json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["status"], "CANCELLED");

    let (status, _) = send(&db, MockProcessor::new(), post(alice.id, &cancel, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) =
        send(&db, MockProcessor::new(), post(alice.id, &format!("/api/v1/orders/{second}/confirm"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&db, MockProcessor::new(), get(alice.id, "/api/v1/points")).await;
    assert_eq!(json(&body)["balance"]["amount"], "850.00");
}
