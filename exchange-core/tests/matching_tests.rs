mod common;

use common::{create_test_user, seed_ticker, setup_db};
use exchange_core::gateway::OrderGateway;
use exchange_core::models::Balance;
use exchange_core::types::{CallerIdentity, Direction, OrderKind, OrderStatus, Role, RUB};
use serial_test::serial;

fn identity(user_id: uuid::Uuid) -> CallerIdentity {
    CallerIdentity { user_id, role: Role::User }
}

async fn fund(pool: &sqlx::PgPool, user: uuid::Uuid, ticker: &str, amount: i64) {
    let mut tx = pool.begin().await.unwrap();
    exchange_core::models::Ledger::credit(&mut tx, user, ticker, amount)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn limit_orders_cross_at_the_makers_price() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let seller = create_test_user(&pool, "seller").await;
    let buyer = create_test_user(&pool, "buyer").await;
    fund(&pool, seller, "AAA", 10).await;
    fund(&pool, buyer, RUB, 10_000).await;

    let gateway = OrderGateway::new(pool.clone());

    let ask = gateway
        .submit_order(identity(seller), "AAA", Direction::Sell, OrderKind::Limit, 10, Some(100))
        .await
        .unwrap();
    assert_eq!(ask.status, OrderStatus::New);

    let bid = gateway
        .submit_order(identity(buyer), "AAA", Direction::Buy, OrderKind::Limit, 10, Some(105))
        .await
        .unwrap();

    // Trade prints at the maker's (seller's) price, not the taker's limit.
    assert_eq!(bid.status, OrderStatus::Executed);
    assert_eq!(bid.filled, 10);

    let buyer_rub = Balance::get(&pool, buyer, RUB).await.unwrap().unwrap();
    assert_eq!(buyer_rub.total, 10_000 - 1000);
    assert_eq!(buyer_rub.reserved, 0);

    let seller_rub = Balance::get(&pool, seller, RUB).await.unwrap().unwrap();
    assert_eq!(seller_rub.total, 1000);

    let buyer_aaa = Balance::get(&pool, buyer, "AAA").await.unwrap().unwrap();
    assert_eq!(buyer_aaa.total, 10);
}

#[tokio::test]
#[serial]
async fn partial_fill_leaves_remainder_resting_with_correct_reservation() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let seller = create_test_user(&pool, "seller2").await;
    let buyer = create_test_user(&pool, "buyer2").await;
    fund(&pool, seller, "AAA", 5).await;
    fund(&pool, buyer, RUB, 10_000).await;

    let gateway = OrderGateway::new(pool.clone());

    gateway
        .submit_order(identity(seller), "AAA", Direction::Sell, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();

    let bid = gateway
        .submit_order(identity(buyer), "AAA", Direction::Buy, OrderKind::Limit, 10, Some(100))
        .await
        .unwrap();

    assert_eq!(bid.status, OrderStatus::PartExecuted);
    assert_eq!(bid.filled, 5);

    let buyer_rub = Balance::get(&pool, buyer, RUB).await.unwrap().unwrap();
    assert_eq!(buyer_rub.total, 10_000 - 500);
    // Remaining 5 units reserved at the taker's own limit price.
    assert_eq!(buyer_rub.reserved, 500);
}

#[tokio::test]
#[serial]
async fn market_order_fails_without_enough_liquidity_and_touches_nothing() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let seller = create_test_user(&pool, "seller3").await;
    let buyer = create_test_user(&pool, "buyer3").await;
    fund(&pool, seller, "AAA", 3).await;
    fund(&pool, buyer, RUB, 10_000).await;

    let gateway = OrderGateway::new(pool.clone());
    gateway
        .submit_order(identity(seller), "AAA", Direction::Sell, OrderKind::Limit, 3, Some(100))
        .await
        .unwrap();

    let err = gateway
        .submit_order(identity(buyer), "AAA", Direction::Buy, OrderKind::Market, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, exchange_core::ExchangeError::InsufficientLiquidity { .. }));

    let buyer_rub = Balance::get(&pool, buyer, RUB).await.unwrap().unwrap();
    assert_eq!(buyer_rub.total, 10_000);
    assert_eq!(buyer_rub.reserved, 0);

    let orders = gateway.list_orders_for_user(identity(buyer), buyer).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[serial]
async fn cancelling_an_untouched_order_restores_balances_exactly() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let buyer = create_test_user(&pool, "buyer4").await;
    fund(&pool, buyer, RUB, 10_000).await;

    let gateway = OrderGateway::new(pool.clone());
    let before = Balance::get(&pool, buyer, RUB).await.unwrap().unwrap();

    let order = gateway
        .submit_order(identity(buyer), "AAA", Direction::Buy, OrderKind::Limit, 10, Some(100))
        .await
        .unwrap();

    gateway.cancel_order(identity(buyer), order.id).await.unwrap();

    let after = Balance::get(&pool, buyer, RUB).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
#[serial]
async fn time_priority_fills_the_older_resting_order_first() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let older = create_test_user(&pool, "older").await;
    let younger = create_test_user(&pool, "younger").await;
    let taker = create_test_user(&pool, "taker").await;
    fund(&pool, older, "AAA", 5).await;
    fund(&pool, younger, "AAA", 5).await;
    fund(&pool, taker, RUB, 10_000).await;

    let gateway = OrderGateway::new(pool.clone());
    gateway
        .submit_order(identity(older), "AAA", Direction::Sell, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();
    gateway
        .submit_order(identity(younger), "AAA", Direction::Sell, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();

    gateway
        .submit_order(identity(taker), "AAA", Direction::Buy, OrderKind::Market, 5, None)
        .await
        .unwrap();

    let older_aaa = Balance::get(&pool, older, "AAA").await.unwrap().unwrap();
    assert_eq!(older_aaa.total, 0, "older resting order should be fully drained first");

    let younger_aaa = Balance::get(&pool, younger, "AAA").await.unwrap().unwrap();
    assert_eq!(younger_aaa.total, 5, "younger resting order untouched");
}

#[tokio::test]
#[serial]
async fn cancel_is_forbidden_for_a_non_owner_non_admin_caller() {
    let pool = setup_db().await;
    seed_ticker(&pool, "AAA").await;
    let owner = create_test_user(&pool, "owner").await;
    let stranger = create_test_user(&pool, "stranger").await;
    fund(&pool, owner, RUB, 1000).await;

    let gateway = OrderGateway::new(pool.clone());
    let order = gateway
        .submit_order(identity(owner), "AAA", Direction::Buy, OrderKind::Limit, 5, Some(100))
        .await
        .unwrap();

    let err = gateway.cancel_order(identity(stranger), order.id).await.unwrap_err();
    assert!(matches!(err, exchange_core::ExchangeError::Forbidden { .. }));
}
