mod common;

use common::{create_test_user, seed_ticker, setup_db};
use exchange_core::models::order::OrderStore;
use exchange_core::types::{Direction, OrderKind, OrderStatus};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn insert_rejects_duplicate_id() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "alice").await;
    seed_ticker(&pool, "AAA").await;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    OrderStore::insert(&mut tx, id, user, "AAA", Direction::Buy, OrderKind::Limit, 10, Some(100))
        .await
        .unwrap();
    let err = OrderStore::insert(&mut tx, id, user, "AAA", Direction::Buy, OrderKind::Limit, 10, Some(100))
        .await
        .unwrap_err();
    assert!(matches!(err, exchange_core::ExchangeError::DuplicateOrder(got) if got == id));
}

#[tokio::test]
#[serial]
async fn apply_fill_recomputes_status() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "bob").await;
    seed_ticker(&pool, "AAA").await;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    OrderStore::insert(&mut tx, id, user, "AAA", Direction::Sell, OrderKind::Limit, 10, Some(50))
        .await
        .unwrap();

    let order = OrderStore::apply_fill(&mut tx, id, 4).await.unwrap();
    assert_eq!(order.filled, 4);
    assert_eq!(order.status, OrderStatus::PartExecuted);

    let order = OrderStore::apply_fill(&mut tx, id, 6).await.unwrap();
    assert_eq!(order.filled, 10);
    assert_eq!(order.status, OrderStatus::Executed);
}

#[tokio::test]
#[serial]
async fn apply_fill_is_a_no_op_after_cancellation() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "carol").await;
    seed_ticker(&pool, "AAA").await;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    OrderStore::insert(&mut tx, id, user, "AAA", Direction::Sell, OrderKind::Limit, 10, Some(50))
        .await
        .unwrap();
    OrderStore::mark_cancelled(&mut tx, id).await.unwrap();

    let order = OrderStore::apply_fill(&mut tx, id, 4).await.unwrap();
    assert_eq!(order.filled, 0);
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn mark_cancelled_is_idempotent() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "dave").await;
    seed_ticker(&pool, "AAA").await;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    OrderStore::insert(&mut tx, id, user, "AAA", Direction::Sell, OrderKind::Limit, 10, Some(50))
        .await
        .unwrap();
    let first = OrderStore::mark_cancelled(&mut tx, id).await.unwrap();
    let second = OrderStore::mark_cancelled(&mut tx, id).await.unwrap();
    assert_eq!(first.status, OrderStatus::Cancelled);
    assert_eq!(second.status, OrderStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn fetch_offers_orders_by_price_improvement_then_time() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "erin").await;
    seed_ticker(&pool, "AAA").await;

    let mut tx = pool.begin().await.unwrap();
    let worse = Uuid::new_v4();
    OrderStore::insert(&mut tx, worse, user, "AAA", Direction::Sell, OrderKind::Limit, 5, Some(105))
        .await
        .unwrap();
    let better_older = Uuid::new_v4();
    OrderStore::insert(&mut tx, better_older, user, "AAA", Direction::Sell, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();
    let better_younger = Uuid::new_v4();
    OrderStore::insert(&mut tx, better_younger, user, "AAA", Direction::Sell, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();

    // A BUY taker consumes the SELL book: cheapest first, oldest first at a tie.
    let offers = OrderStore::fetch_offers(&mut tx, "AAA", Direction::Sell, None)
        .await
        .unwrap();

    assert_eq!(offers.len(), 3);
    assert_eq!(offers[0].id, better_older);
    assert_eq!(offers[1].id, better_younger);
    assert_eq!(offers[2].id, worse);
}
