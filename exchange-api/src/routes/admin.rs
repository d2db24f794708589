use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use exchange_core::models::{Balance, Ledger};
use exchange_core::types::CallerIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{map_err, ErrorResponse};
use crate::AppState;

/// Admin-only deposit/withdraw surface — the one place cash enters or
/// leaves the ledger from outside a trade. Grounded on the teacher's
/// `balances::deposit`/`balances::withdraw` handlers, generalized from
/// their EUR-only demo restriction to any registered ticker.
#[derive(Debug, Deserialize)]
pub struct AdjustBalanceRequest {
    pub user_id: Uuid,
    pub ticker: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub ticker: String,
    pub total: i64,
    pub reserved: i64,
}

impl From<Balance> for BalanceResponse {
    fn from(b: Balance) -> Self {
        Self { ticker: b.ticker, total: b.total, reserved: b.reserved }
    }
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
}

fn require_admin(caller: &CallerIdentity) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if !caller.is_admin() {
        return Err(map_err(exchange_core::ExchangeError::Forbidden {
            caller: caller.user_id,
            resource: "admin balance adjustment".into(),
        }));
    }
    Ok(())
}

async fn deposit(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<AdjustBalanceRequest>,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&caller)?;

    let mut tx = state.pool.begin().await.map_err(|e| map_err(e.into()))?;
    Ledger::credit(&mut tx, req.user_id, &req.ticker, req.amount)
        .await
        .map_err(map_err)?;
    tx.commit().await.map_err(|e| map_err(e.into()))?;

    let balance = Balance::get(&state.pool, req.user_id, &req.ticker)
        .await
        .map_err(map_err)?
        .expect("balance row exists after credit");
    Ok(Json(balance.into()))
}

async fn withdraw(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<AdjustBalanceRequest>,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&caller)?;

    let mut tx = state.pool.begin().await.map_err(|e| map_err(e.into()))?;
    Ledger::debit(&mut tx, req.user_id, &req.ticker, req.amount)
        .await
        .map_err(map_err)?;
    tx.commit().await.map_err(|e| map_err(e.into()))?;

    let balance = Balance::get(&state.pool, req.user_id, &req.ticker)
        .await
        .map_err(map_err)?
        .expect("balance row exists after debit");
    Ok(Json(balance.into()))
}
