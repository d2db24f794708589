use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ExchangeError, Result};
use crate::types::{Direction, OrderKind, OrderStatus};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub kind: OrderKind,
    pub qty: i64,
    pub price: Option<i64>,
    pub filled: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn remaining(&self) -> i64 {
        self.qty - self.filled
    }
}

/// Persistence for orders (spec §4.2). Every mutation here is called from
/// within the caller's transaction — the matching engine is what opens and
/// commits it — mirroring the teacher's `Order::add_fill`, which is always
/// handed a live `Transaction` rather than a pool.
pub struct OrderStore;

impl OrderStore {
    /// Inserts a new order with a caller-supplied id. Fails with
    /// `DuplicateOrder` if the id already exists, satisfying the spec's
    /// idempotency requirement for retried submissions.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        user_id: Uuid,
        ticker: &str,
        direction: Direction,
        kind: OrderKind,
        qty: i64,
        price: Option<i64>,
    ) -> Result<Order> {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        if existing.is_some() {
            return Err(ExchangeError::DuplicateOrder(id));
        }

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, ticker, direction, kind, qty, price, filled, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 'NEW')
             RETURNING id, user_id, ticker, direction, kind, qty, price, filled, status, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(ticker)
        .bind(direction)
        .bind(kind)
        .bind(qty)
        .bind(price)
        .fetch_one(&mut **tx)
        .await?;

        Ok(order)
    }

    /// Applies a fill atomically: bumps `filled` and recomputes `status` in
    /// one UPDATE so a concurrent cancel can't observe a half-updated row.
    /// A no-op once the order is already `CANCELLED`, matching the
    /// teacher's `add_fill` guard against a race between cancellation and a
    /// settlement still in flight.
    pub async fn apply_fill(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        fill_qty: i64,
    ) -> Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET
                filled = CASE WHEN status = 'CANCELLED' THEN filled ELSE filled + $1 END,
                status = CASE
                    WHEN status = 'CANCELLED' THEN 'CANCELLED'
                    WHEN filled + $1 >= qty THEN 'EXECUTED'
                    ELSE 'PART_EXECUTED'
                END
             WHERE id = $2
             RETURNING id, user_id, ticker, direction, kind, qty, price, filled, status, created_at",
        )
        .bind(fill_qty)
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;

        Ok(order)
    }

    /// Marks an order cancelled. Idempotent against an order already in a
    /// terminal state — returns the current row unchanged rather than
    /// erroring, so a retried cancel request is harmless.
    pub async fn mark_cancelled(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<Order> {
        let order: Order = sqlx::query_as(
            "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;

        if order.status.is_terminal() {
            return Ok(order);
        }

        let updated = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = 'CANCELLED' WHERE id = $1
             RETURNING id, user_id, ticker, direction, kind, qty, price, filled, status, created_at",
        )
        .bind(order_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(updated)
    }

    pub async fn get_by_id(pool: &PgPool, order_id: Uuid) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
             FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(pool)
        .await?;
        Ok(order)
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    /// Scans the resting book on the crossing side for a taker, ordered by
    /// price-improvement-for-the-taker then time priority then id — the
    /// SQL-backed equivalent of the teacher's in-memory
    /// `BTreeMap<Price, PriceLevel>` walk in `OrderBook::match_order`, since
    /// this design keeps the book durable instead of in process memory.
    /// `price_cap` bounds how far the scan crosses: for a buy taker it is
    /// the maximum price willing to pay (ask side sorted ascending); for a
    /// sell taker it is the minimum price willing to accept (bid side
    /// sorted descending). `None` means unconditional crossing (market
    /// orders).
    pub async fn fetch_offers(
        tx: &mut Transaction<'_, Postgres>,
        ticker: &str,
        resting_direction: Direction,
        price_cap: Option<i64>,
    ) -> Result<Vec<Order>> {
        let rows = match resting_direction {
            Direction::Sell => {
                // Taker is buying: cheapest asks first, then oldest, then lowest id.
                sqlx::query_as::<_, Order>(
                    "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
                     FROM orders
                     WHERE ticker = $1 AND direction = 'SELL' AND status IN ('NEW', 'PART_EXECUTED')
                       AND ($2::BIGINT IS NULL OR price <= $2)
                     ORDER BY price ASC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(price_cap)
                .fetch_all(&mut **tx)
                .await?
            }
            Direction::Buy => {
                // Taker is selling: highest bids first, then oldest, then lowest id.
                sqlx::query_as::<_, Order>(
                    "SELECT id, user_id, ticker, direction, kind, qty, price, filled, status, created_at
                     FROM orders
                     WHERE ticker = $1 AND direction = 'BUY' AND status IN ('NEW', 'PART_EXECUTED')
                       AND ($2::BIGINT IS NULL OR price >= $2)
                     ORDER BY price DESC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(price_cap)
                .fetch_all(&mut **tx)
                .await?
            }
        };
        Ok(rows)
    }

    /// Top-of-book depth snapshot for the order-book query endpoint,
    /// aggregated by price level, best price first on each side.
    pub async fn book_depth(
        pool: &PgPool,
        ticker: &str,
        direction: Direction,
        levels: i64,
    ) -> Result<Vec<(i64, i64)>> {
        let rows: Vec<(Option<i64>, i64)> = match direction {
            Direction::Buy => {
                sqlx::query_as(
                    "SELECT price, SUM(qty - filled) FROM orders
                     WHERE ticker = $1 AND direction = 'BUY' AND status IN ('NEW', 'PART_EXECUTED')
                     GROUP BY price ORDER BY price DESC LIMIT $2",
                )
                .bind(ticker)
                .bind(levels)
                .fetch_all(pool)
                .await?
            }
            Direction::Sell => {
                sqlx::query_as(
                    "SELECT price, SUM(qty - filled) FROM orders
                     WHERE ticker = $1 AND direction = 'SELL' AND status IN ('NEW', 'PART_EXECUTED')
                     GROUP BY price ORDER BY price ASC LIMIT $2",
                )
                .bind(ticker)
                .bind(levels)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(rows
            .into_iter()
            .filter_map(|(price, qty)| price.map(|p| (p, qty)))
            .collect())
    }
}
