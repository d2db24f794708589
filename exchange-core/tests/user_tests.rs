mod common;

use common::{create_test_user, seed_ticker, setup_db};
use exchange_core::models::order::OrderStore;
use exchange_core::models::{Ledger, User};
use exchange_core::types::{Direction, OrderKind};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn delete_rejects_user_with_an_open_order() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let user = create_test_user(&pool, "holder").await;

    let mut tx = pool.begin().await.unwrap();
    OrderStore::insert(
        &mut tx,
        Uuid::new_v4(),
        user,
        "AAA",
        Direction::Sell,
        OrderKind::Limit,
        5,
        Some(100),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let err = User::delete(&mut tx, user).await.unwrap_err();
    assert!(matches!(err, exchange_core::ExchangeError::Validation(_)));

    let still_there = User::find_by_id(&pool, user).await.unwrap();
    assert!(still_there.is_some());
}

#[tokio::test]
#[serial]
async fn delete_rejects_user_with_nonzero_balance() {
    let pool = setup_db().await;
    let user = create_test_user(&pool, "funded").await;

    let mut tx = pool.begin().await.unwrap();
    Ledger::credit(&mut tx, user, exchange_core::types::RUB, 100)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let err = User::delete(&mut tx, user).await.unwrap_err();
    assert!(matches!(err, exchange_core::ExchangeError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn delete_succeeds_once_orders_are_cancelled_and_balance_is_zero() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let user = create_test_user(&pool, "clean").await;

    let mut tx = pool.begin().await.unwrap();
    Ledger::credit(&mut tx, user, "AAA", 10).await.unwrap();
    Ledger::debit(&mut tx, user, "AAA", 10).await.unwrap();
    User::delete(&mut tx, user).await.unwrap();
    tx.commit().await.unwrap();

    let gone = User::find_by_id(&pool, user).await.unwrap();
    assert!(gone.is_none());
}
