use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ExchangeError, Result};

/// Cached balance row — the entity of record (spec §3 Balance).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Balance {
    pub user_id: Uuid,
    pub ticker: String,
    pub total: i64,
    pub reserved: i64,
}

impl Balance {
    pub fn available(&self) -> i64 {
        self.total - self.reserved
    }

    pub async fn get_for_user(pool: &sqlx::PgPool, user_id: Uuid) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT user_id, ticker, total, reserved FROM balances WHERE user_id = $1 ORDER BY ticker",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(pool: &sqlx::PgPool, user_id: Uuid, ticker: &str) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            "SELECT user_id, ticker, total, reserved FROM balances WHERE user_id = $1 AND ticker = $2",
        )
        .bind(user_id)
        .bind(ticker)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }
}

/// The balance-ledger primitives (spec §4.1). Every operation runs inside
/// the caller's transaction and takes an advisory lock on (user, ticker)
/// first, the same technique the teacher uses in
/// `LedgerEntry::compute_lock_key` to serialize concurrent mutation of one
/// balance row without escalating to a table-level or row-level `FOR
/// UPDATE` that would deadlock under concurrent same-row contention.
pub struct Ledger;

impl Ledger {
    fn lock_key(user_id: Uuid, ticker: &str) -> i64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let bytes = user_id.as_bytes();
        let user_part = i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);

        let mut hasher = DefaultHasher::new();
        ticker.hash(&mut hasher);
        let ticker_hash = hasher.finish() as i64;

        user_part ^ ticker_hash
    }

    async fn lock_row(tx: &mut Transaction<'_, Postgres>, user_id: Uuid, ticker: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::lock_key(user_id, ticker))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn load_or_zero(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
    ) -> Result<(i64, i64)> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT total, reserved FROM balances WHERE user_id = $1 AND ticker = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(ticker)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.unwrap_or((0, 0)))
    }

    async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        total: i64,
        reserved: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO balances (user_id, ticker, total, reserved) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, ticker) DO UPDATE SET total = $3, reserved = $4",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(total)
        .bind(reserved)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// `total += amount`. Creates the balance row if absent. Rejects `amount <= 0`.
    pub async fn credit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(ExchangeError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        Self::lock_row(tx, user_id, ticker).await?;
        let (total, reserved) = Self::load_or_zero(tx, user_id, ticker).await?;
        let new_total = total.checked_add(amount).ok_or_else(|| {
            ExchangeError::LedgerInvariantViolation("credit overflow".into())
        })?;
        Self::upsert(tx, user_id, ticker, new_total, reserved).await
    }

    /// `total -= amount`, requires `available >= amount`.
    pub async fn debit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(ExchangeError::Validation(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        Self::lock_row(tx, user_id, ticker).await?;
        let (total, reserved) = Self::load_or_zero(tx, user_id, ticker).await?;
        if total - reserved < amount {
            return Err(ExchangeError::InsufficientFunds {
                ticker: ticker.to_string(),
                available: total - reserved,
                required: amount,
            });
        }
        Self::upsert(tx, user_id, ticker, total - amount, reserved).await
    }

    /// `reserved += amount`, requires `available >= amount`.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(ExchangeError::Validation(format!(
                "reserve amount must be positive, got {amount}"
            )));
        }
        Self::lock_row(tx, user_id, ticker).await?;
        let (total, reserved) = Self::load_or_zero(tx, user_id, ticker).await?;
        if total - reserved < amount {
            return Err(ExchangeError::InsufficientFunds {
                ticker: ticker.to_string(),
                available: total - reserved,
                required: amount,
            });
        }
        Self::upsert(tx, user_id, ticker, total, reserved + amount).await
    }

    /// `reserved -= amount`, requires `reserved >= amount`.
    pub async fn release(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(ExchangeError::Validation(format!(
                "release amount must be positive, got {amount}"
            )));
        }
        Self::lock_row(tx, user_id, ticker).await?;
        let (total, reserved) = Self::load_or_zero(tx, user_id, ticker).await?;
        if reserved < amount {
            return Err(ExchangeError::LedgerInvariantViolation(format!(
                "release {amount} exceeds reserved {reserved} for {ticker}"
            )));
        }
        Self::upsert(tx, user_id, ticker, total, reserved - amount).await
    }

    /// The atomic trade primitive (spec §4.1 `settle`). Moves `qty` of
    /// `ticker` from seller to buyer and `qty*price` of RUB from buyer to
    /// seller, releasing the seller's asset reservation and the buyer's RUB
    /// reservation for exactly this fill.
    pub async fn settle(
        tx: &mut Transaction<'_, Postgres>,
        buyer: Uuid,
        seller: Uuid,
        ticker: &str,
        qty: i64,
        price: i64,
    ) -> Result<()> {
        if qty <= 0 || price <= 0 {
            return Err(ExchangeError::Validation(
                "settle requires positive qty and price".into(),
            ));
        }
        let notional = qty.checked_mul(price).ok_or_else(|| {
            ExchangeError::LedgerInvariantViolation("qty*price overflow in settle".into())
        })?;

        // Lock in a deterministic order (by user id, then ticker) so two
        // concurrent settlements touching the same pair of users can't
        // deadlock against each other.
        let mut legs: Vec<(Uuid, &str)> = vec![(seller, ticker), (buyer, ticker), (buyer, crate::types::RUB), (seller, crate::types::RUB)];
        legs.sort();
        legs.dedup();
        for (user_id, tk) in &legs {
            Self::lock_row(tx, *user_id, tk).await?;
        }

        Self::release(tx, seller, ticker, qty).await?;
        Self::debit(tx, seller, ticker, qty).await?;
        Self::credit(tx, buyer, ticker, qty).await?;

        Self::release(tx, buyer, crate::types::RUB, notional).await?;
        Self::debit(tx, buyer, crate::types::RUB, notional).await?;
        Self::credit(tx, seller, crate::types::RUB, notional).await?;

        Ok(())
    }
}
