mod support;

use futures_util::future::join_all;
use order_engine::{
    db_types::{CouponStatus, Money, NewOrder, NewOrderLine},
    events::EventProducers,
    CatalogManagement,
    OrderError,
    OrderFlowApi,
    SqliteDatabase,
};
use support::*;

fn api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coupon_race_has_exactly_one_winner() {
    let db = prepare_test_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(100_000)).await;
    let product = seed_product(&db, "keyboard", Money::from_units(10_000), 10).await;
    let coupon = seed_fixed_coupon(&db, alice.id, Money::from_units(5_000)).await;

    let tasks = (0..2).map(|_| {
        let api = api(&db);
        let order = NewOrder::new(alice.id, vec![NewOrderLine::new(product.id, 2).with_coupon(coupon.id)]);
        tokio::spawn(async move { api.create_order(order).await })
    });
    let results = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect::<Vec<_>>();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::AlreadyUsed(id)) if *id == coupon.id))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, 1);
    assert_eq!(db.fetch_coupon(coupon.id).await.unwrap().unwrap().status, CouponStatus::Used);
    assert_eq!(stock_of(&db, product.id).await, 8);
    assert_eq!(balance_of(&db, alice.id).await, Money::from_units(85_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_is_never_oversold() {
    let db = prepare_test_db().await;
    let product = seed_product(&db, "limited edition", Money::from_units(100), 5).await;
    let mut users = Vec::new();
    for i in 0..12 {
        users.push(seed_user(&db, &format!("buyer{i}"), Money::from_units(1_000)).await);
    }

    let tasks = users.iter().map(|user| {
        let api = api(&db);
        let order = NewOrder::new(user.id, vec![NewOrderLine::new(product.id, 1)]);
        tokio::spawn(async move { api.create_order(order).await })
    });
    let results = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect::<Vec<_>>();

    let sold = results.iter().filter(|r| r.is_ok()).count();
    let refused = results.iter().filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. }))).count();
    assert_eq!(sold, 5);
    assert_eq!(refused, 7);
    assert_eq!(stock_of(&db, product.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_balance_is_never_spent_twice() {
    let db = prepare_test_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(30_000)).await;
    let product = seed_product(&db, "monitor", Money::from_units(20_000), 100).await;

    let tasks = (0..4).map(|_| {
        let api = api(&db);
        let order = NewOrder::new(alice.id, vec![NewOrderLine::new(product.id, 1)]);
        tokio::spawn(async move { api.create_order(order).await })
    });
    let results = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(OrderError::InsufficientBalance { .. }))).count(), 3);
    assert_eq!(balance_of(&db, alice.id).await, Money::from_units(10_000));
    assert_eq!(stock_of(&db, product.id).await, 99);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_refund_once() {
    let db = prepare_test_db().await;
    let alice = seed_user(&db, "alice", Money::from_units(1_000)).await;
    let product = seed_product(&db, "keyboard", Money::from_units(300), 10).await;
    let placed = api(&db).create_order(NewOrder::new(alice.id, vec![NewOrderLine::new(product.id, 2)])).await.unwrap();

    let tasks = (0..3).map(|_| {
        let api = api(&db);
        let id = placed.order.id;
        tokio::spawn(async move { api.cancel_order(id).await })
    });
    let results = join_all(tasks).await.into_iter().map(|r| r.expect("task panicked")).collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(OrderError::InvalidOrderStatus { .. }))).count(), 2);
    assert_eq!(balance_of(&db, alice.id).await, Money::from_units(1_000));
    assert_eq!(stock_of(&db, product.id).await, 10);
}
