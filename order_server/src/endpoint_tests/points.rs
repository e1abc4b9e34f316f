use actix_web::http::StatusCode;
use order_engine::db_types::Money;
use serde_json::json;

use super::{
    helpers::{error_message, get, json, post, prepare_db, seed_user, send},
    mocks::MockProcessor,
};

#[actix_web::test]
async fn charge_and_read_points() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::zero()).await;

    let (status, body) =
        send(&db, MockProcessor::new(), post(alice.id, "/api/v1/points/charge", json!({ "amount": "100.50" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["amount"], "100.50");

    let (status, body) =
        send(&db, MockProcessor::new(), post(alice.id, "/api/v1/points/charge", json!({ "amount": 50 }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["amount"], "150.50");

    let (status, body) = send(&db, MockProcessor::new(), get(alice.id, "/api/v1/points")).await;
    assert_eq!(status, StatusCode::OK);
    let points = json(&body);
    assert_eq!(points["balance"]["amount"], "150.50");
    let history = points["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["kind"], "CHARGE");
    assert_eq!(history[0]["amount"], "100.50");
    assert_eq!(history[1]["balanceAfter"], "150.50");
}

#[actix_web::test]
async fn invalid_charges() {
    let db = prepare_db().await;
    let alice = seed_user(&db, "alice", Money::zero()).await;

    for amount in [json!("0"), json!(-5), json!("ten"), json!(1e30)] {
        let (status, body) =
            send(&db, MockProcessor::new(), post(alice.id, "/api/v1/points/charge", json!({ "amount": amount }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{amount} gave {body}");
        assert!(!error_message(&body).is_empty());
    }

    let (status, _) =
        send(&db, MockProcessor::new(), post(alice.id + 100, "/api/v1/points/charge", json!({ "amount": 10 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&db, MockProcessor::new(), get(alice.id + 100, "/api/v1/points")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
