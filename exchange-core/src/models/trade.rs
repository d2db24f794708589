use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub ticker: String,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub qty: i64,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

/// Append-only trade history (spec §4.3), queried by the Order Gateway's
/// trade-log endpoint. Rows are written under the matching engine's
/// enclosing transaction, never standalone, so a trade row and the fill it
/// records against both orders always commit or roll back together.
pub struct TradeLog;

impl TradeLog {
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        ticker: &str,
        maker_order_id: Uuid,
        taker_order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        qty: i64,
        price: i64,
    ) -> Result<Trade> {
        let id = Uuid::new_v4();
        let trade = sqlx::query_as::<_, Trade>(
            "INSERT INTO trades (id, ticker, maker_order_id, taker_order_id, buyer_id, seller_id, qty, price)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, ticker, maker_order_id, taker_order_id, buyer_id, seller_id, qty, price, created_at",
        )
        .bind(id)
        .bind(ticker)
        .bind(maker_order_id)
        .bind(taker_order_id)
        .bind(buyer_id)
        .bind(seller_id)
        .bind(qty)
        .bind(price)
        .fetch_one(&mut **tx)
        .await?;
        Ok(trade)
    }

    /// Newest-first trade history, optionally scoped to a user (either side
    /// of the trade) and/or a ticker.
    pub async fn list(
        pool: &PgPool,
        user_id: Option<Uuid>,
        ticker: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, Trade>(
            "SELECT id, ticker, maker_order_id, taker_order_id, buyer_id, seller_id, qty, price, created_at
             FROM trades
             WHERE ($1::UUID IS NULL OR buyer_id = $1 OR seller_id = $1)
               AND ($2::VARCHAR IS NULL OR ticker = $2)
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_order(pool: &PgPool, order_id: Uuid) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, Trade>(
            "SELECT id, ticker, maker_order_id, taker_order_id, buyer_id, seller_id, qty, price, created_at
             FROM trades
             WHERE maker_order_id = $1 OR taker_order_id = $1
             ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
