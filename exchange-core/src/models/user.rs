use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ExchangeError, Result};
use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    #[sqlx(skip)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// sha256 over the raw API key, matching the comparison the auth middleware
/// performs against `users.api_key_hash` — we never store the key itself.
pub fn hash_api_key(raw: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hasher.finalize().to_vec()
}

impl User {
    pub async fn create(pool: &PgPool, name: &str, role: Role, raw_api_key: &str) -> Result<Self> {
        let id = Uuid::new_v4();
        let hash = hash_api_key(raw_api_key);
        let row: (Uuid, String, Role) = sqlx::query_as(
            "INSERT INTO users (id, name, role, api_key_hash) VALUES ($1, $2, $3, $4)
             RETURNING id, name, role",
        )
        .bind(id)
        .bind(name)
        .bind(role)
        .bind(hash)
        .fetch_one(pool)
        .await?;
        Ok(User {
            id: row.0,
            name: row.1,
            role: row.2,
            created_at: None,
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row: Option<(Uuid, String, Role)> =
            sqlx::query_as("SELECT id, name, role FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(id, name, role)| User {
            id,
            name,
            role,
            created_at: None,
        }))
    }

    /// Looks a caller up by the sha256 of the bearer token presented on the
    /// request — the only credential form the glue layer understands.
    pub async fn find_by_api_key(pool: &PgPool, raw_api_key: &str) -> Result<Option<Self>> {
        let hash = hash_api_key(raw_api_key);
        let row: Option<(Uuid, String, Role)> =
            sqlx::query_as("SELECT id, name, role FROM users WHERE api_key_hash = $1")
                .bind(hash)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(id, name, role)| User {
            id,
            name,
            role,
            created_at: None,
        }))
    }

    /// Enforces the user-deletion invariant decided in the Open Questions:
    /// a user with an open order or a nonzero balance in any asset cannot
    /// be deleted.
    pub async fn delete(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<()> {
        let open_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status IN ('NEW', 'PART_EXECUTED')",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        if open_orders > 0 {
            return Err(ExchangeError::Validation(format!(
                "user {user_id} has {open_orders} open order(s), cancel them before deleting"
            )));
        }

        let nonzero_balances: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM balances WHERE user_id = $1 AND total <> 0")
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;
        if nonzero_balances > 0 {
            return Err(ExchangeError::Validation(format!(
                "user {user_id} holds nonzero balances, withdraw before deleting"
            )));
        }

        sqlx::query("DELETE FROM balances WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
