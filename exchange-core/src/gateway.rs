use std::sync::Arc;

use dashmap::DashMap;
use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::{ExchangeError, Result};
use crate::matching::MatchingEngine;
use crate::models::order::{Order, OrderStore};
use crate::models::{Balance, TradeLog};
use crate::types::{is_valid_ticker, CallerIdentity, Direction, OrderKind};

/// Narrow façade in front of the Matching Engine (spec §4.5): validates
/// inputs, authenticates the caller, serializes concurrent activity on one
/// instrument, and calls the engine. Per-ticker serialization uses a
/// `DashMap`-backed lock registry — the same thread-safe-map pattern the
/// pack's other backends (rate limiters, order trackers) reach for — since
/// the teacher's own deployment model (one matching-engine process per
/// instrument) has no equivalent to borrow from directly.
pub struct OrderGateway {
    pool: PgPool,
    engine: MatchingEngine,
    ticker_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl OrderGateway {
    pub fn new(pool: PgPool) -> Self {
        Self {
            engine: MatchingEngine::new(pool.clone()),
            pool,
            ticker_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, ticker: &str) -> Arc<AsyncMutex<()>> {
        self.ticker_locks
            .entry(ticker.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn validate_ticker(ticker: &str) -> Result<()> {
        if !is_valid_ticker(ticker) {
            return Err(ExchangeError::Validation(format!(
                "invalid ticker: {ticker}"
            )));
        }
        Ok(())
    }

    /// Submits a market or limit order on behalf of `caller`. Generates
    /// the order id so it can be handed back to the caller for idempotent
    /// retries even if the response is lost.
    pub async fn submit_order(
        &self,
        caller: CallerIdentity,
        ticker: &str,
        direction: Direction,
        kind: OrderKind,
        qty: i64,
        price: Option<i64>,
    ) -> Result<Order> {
        Self::validate_ticker(ticker)?;
        if qty <= 0 {
            return Err(ExchangeError::Validation("qty must be positive".into()));
        }
        match kind {
            OrderKind::Market if price.is_some() => {
                return Err(ExchangeError::Validation(
                    "market orders must not specify a price".into(),
                ));
            }
            OrderKind::Limit if price.map_or(true, |p| p <= 0) => {
                return Err(ExchangeError::Validation(
                    "limit orders require a positive price".into(),
                ));
            }
            _ => {}
        }

        let order_id = Uuid::new_v4();
        let lock = self.lock_for(ticker);
        let _guard = lock.lock().await;

        match kind {
            OrderKind::Market => {
                self.engine
                    .submit_market(order_id, caller.user_id, ticker, direction, qty)
                    .await
            }
            OrderKind::Limit => {
                self.engine
                    .submit_limit(order_id, caller.user_id, ticker, direction, qty, price.unwrap())
                    .await
            }
        }
    }

    pub async fn cancel_order(&self, caller: CallerIdentity, order_id: Uuid) -> Result<Order> {
        let order = OrderStore::get_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;

        let lock = self.lock_for(&order.ticker);
        let _guard = lock.lock().await;

        self.engine
            .cancel(order_id, caller.user_id, caller.is_admin())
            .await
    }

    pub async fn get_order(&self, caller: CallerIdentity, order_id: Uuid) -> Result<Order> {
        let order = OrderStore::get_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;
        if !caller.may_act_as(order.user_id) {
            return Err(ExchangeError::Forbidden {
                caller: caller.user_id,
                resource: format!("order {order_id}"),
            });
        }
        Ok(order)
    }

    pub async fn list_orders_for_user(&self, caller: CallerIdentity, user_id: Uuid) -> Result<Vec<Order>> {
        if !caller.may_act_as(user_id) {
            return Err(ExchangeError::Forbidden {
                caller: caller.user_id,
                resource: format!("orders of user {user_id}"),
            });
        }
        OrderStore::list_by_user(&self.pool, user_id).await
    }

    /// Aggregated L2 snapshot: bids descending, asks ascending, each
    /// truncated to `depth` levels.
    pub async fn get_orderbook(&self, ticker: &str, depth: i64) -> Result<(Vec<(i64, i64)>, Vec<(i64, i64)>)> {
        Self::validate_ticker(ticker)?;
        let depth = depth.clamp(1, 500);
        let bids = OrderStore::book_depth(&self.pool, ticker, Direction::Buy, depth).await?;
        let asks = OrderStore::book_depth(&self.pool, ticker, Direction::Sell, depth).await?;
        Ok((bids, asks))
    }

    pub async fn list_trades(
        &self,
        user_id: Option<Uuid>,
        ticker: Option<&str>,
        limit: i64,
    ) -> Result<Vec<crate::models::Trade>> {
        let limit = limit.clamp(1, 1000);
        TradeLog::list(&self.pool, user_id, ticker, limit).await
    }

    pub async fn get_balance(&self, caller: CallerIdentity, user_id: Uuid) -> Result<Vec<Balance>> {
        if !caller.may_act_as(user_id) {
            return Err(ExchangeError::Forbidden {
                caller: caller.user_id,
                resource: format!("balances of user {user_id}"),
            });
        }
        Balance::get_for_user(&self.pool, user_id).await
    }
}
