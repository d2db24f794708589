use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ExchangeError, Result};
use crate::matching::decision::{plan_match, RestingOffer};
use crate::models::order::{Order, OrderStore};
use crate::models::{Ledger, TradeLog};
use crate::types::{Direction, OrderKind, OrderStatus, RUB};

/// The decision core (spec §4.4): given a new market or limit order, picks
/// counterparty offers in price-time priority, computes fills, and drives
/// Ledger + Order Store + Trade Log updates inside one transaction per
/// incoming order. Grounded on the teacher's `matching_engine_service`
/// loop and `Trade::settle`, collapsed into a single in-process,
/// single-transaction call since this design has no separate settlement
/// service to round-trip to.
pub struct MatchingEngine {
    pool: PgPool,
}

impl MatchingEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ticker_exists(&self, tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, ticker: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT ticker FROM instruments WHERE ticker = $1")
            .bind(ticker)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }

    fn to_offers(rows: &[Order]) -> Vec<RestingOffer> {
        rows.iter()
            .filter_map(|o| {
                o.price.map(|price| RestingOffer {
                    order_id: o.id,
                    user_id: o.user_id,
                    price,
                    remaining: o.remaining(),
                })
            })
            .collect()
    }

    /// `buyer, seller` for a fill given which side the taker sits on.
    fn roles(taker_direction: Direction, taker_id: Uuid, maker_id: Uuid) -> (Uuid, Uuid) {
        match taker_direction {
            Direction::Buy => (taker_id, maker_id),
            Direction::Sell => (maker_id, taker_id),
        }
    }

    /// **submit_market(taker_order)** — all-or-nothing, never rests.
    pub async fn submit_market(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        ticker: &str,
        direction: Direction,
        qty: i64,
    ) -> Result<Order> {
        if qty <= 0 {
            return Err(ExchangeError::Validation("qty must be positive".into()));
        }

        let mut tx = self.pool.begin().await?;

        if !self.ticker_exists(&mut tx, ticker).await? {
            return Err(ExchangeError::NotFound(format!("instrument {ticker}")));
        }

        let resting_side = direction.counterparty();
        let offer_rows = OrderStore::fetch_offers(&mut tx, ticker, resting_side, None).await?;
        let offers = Self::to_offers(&offer_rows);
        let available: i64 = offers.iter().map(|o| o.remaining).sum();

        if available < qty {
            return Err(ExchangeError::InsufficientLiquidity {
                available,
                required: qty,
            });
        }

        let plan = plan_match(direction, qty, None, &offers);
        debug_assert_eq!(plan.remaining, 0, "pre-scan guaranteed full liquidity");

        match direction {
            Direction::Buy => {
                let cost: i64 = plan.fills.iter().map(|f| f.qty * f.price).sum();
                if cost > 0 {
                    Ledger::reserve(&mut tx, user_id, RUB, cost).await?;
                }
            }
            Direction::Sell => {
                Ledger::reserve(&mut tx, user_id, ticker, qty).await?;
            }
        }

        let mut taker = OrderStore::insert(
            &mut tx,
            order_id,
            user_id,
            ticker,
            direction,
            OrderKind::Market,
            qty,
            None,
        )
        .await?;

        for fill in &plan.fills {
            let (buyer, seller) = Self::roles(direction, user_id, fill.maker_user_id);
            Ledger::settle(&mut tx, buyer, seller, ticker, fill.qty, fill.price).await?;
            OrderStore::apply_fill(&mut tx, fill.maker_order_id, fill.qty).await?;
            taker = OrderStore::apply_fill(&mut tx, order_id, fill.qty).await?;
            TradeLog::append(
                &mut tx,
                ticker,
                fill.maker_order_id,
                order_id,
                buyer,
                seller,
                fill.qty,
                fill.price,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(taker)
    }

    /// **submit_limit(taker_order)** — fills what it can at maker prices,
    /// rests the remainder at the taker's own price.
    pub async fn submit_limit(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        ticker: &str,
        direction: Direction,
        qty: i64,
        price: i64,
    ) -> Result<Order> {
        if qty <= 0 || price <= 0 {
            return Err(ExchangeError::Validation(
                "limit order requires positive qty and price".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        if !self.ticker_exists(&mut tx, ticker).await? {
            return Err(ExchangeError::NotFound(format!("instrument {ticker}")));
        }

        let resting_side = direction.counterparty();
        let price_cap = Some(price);
        let offer_rows = OrderStore::fetch_offers(&mut tx, ticker, resting_side, price_cap).await?;
        let offers = Self::to_offers(&offer_rows);

        let plan = plan_match(direction, qty, Some(price), &offers);

        // Reserve the exact cost the plan is about to incur, computed up
        // front the same way the market path pre-scans its exact cost —
        // this sidesteps tracking a price-improvement leftover later,
        // since the resting remainder is priced at the taker's own limit.
        match direction {
            Direction::Buy => {
                let matched_cost: i64 = plan.fills.iter().map(|f| f.qty * f.price).sum();
                let resting_cost = plan.remaining * price;
                let total = matched_cost + resting_cost;
                if total > 0 {
                    Ledger::reserve(&mut tx, user_id, RUB, total).await?;
                }
            }
            Direction::Sell => {
                Ledger::reserve(&mut tx, user_id, ticker, qty).await?;
            }
        }

        let mut taker = OrderStore::insert(
            &mut tx,
            order_id,
            user_id,
            ticker,
            direction,
            OrderKind::Limit,
            qty,
            Some(price),
        )
        .await?;

        for fill in &plan.fills {
            let (buyer, seller) = Self::roles(direction, user_id, fill.maker_user_id);
            Ledger::settle(&mut tx, buyer, seller, ticker, fill.qty, fill.price).await?;
            OrderStore::apply_fill(&mut tx, fill.maker_order_id, fill.qty).await?;
            taker = OrderStore::apply_fill(&mut tx, order_id, fill.qty).await?;
            TradeLog::append(
                &mut tx,
                ticker,
                fill.maker_order_id,
                order_id,
                buyer,
                seller,
                fill.qty,
                fill.price,
            )
            .await?;
        }

        tx.commit().await?;
        debug_assert!(matches!(
            (taker.status, taker.filled == taker.qty),
            (OrderStatus::Executed, true) | (OrderStatus::New, false) | (OrderStatus::PartExecuted, false)
        ));
        Ok(taker)
    }

    /// **cancel(order_id, caller_id)** — idempotent on an already-terminal order.
    pub async fn cancel(&self, order_id: Uuid, caller_id: Uuid, caller_is_admin: bool) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order: Order = sqlx::query_as(
            "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;

        if order.user_id != caller_id && !caller_is_admin {
            return Err(ExchangeError::Forbidden {
                caller: caller_id,
                resource: format!("order {order_id}"),
            });
        }

        if order.status.is_terminal() {
            tx.commit().await?;
            return Ok(order);
        }

        let outstanding = order.remaining();
        if outstanding > 0 {
            match order.direction {
                Direction::Sell => {
                    Ledger::release(&mut tx, order.user_id, &order.ticker, outstanding).await?;
                }
                Direction::Buy => {
                    let price = order.price.ok_or_else(|| {
                        ExchangeError::LedgerInvariantViolation(
                            "resting BUY order missing price".into(),
                        )
                    })?;
                    Ledger::release(&mut tx, order.user_id, RUB, outstanding * price).await?;
                }
            }
        }

        let cancelled = OrderStore::mark_cancelled(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(cancelled)
    }
}
