use axum::{extract::State, http::StatusCode, routing::get, Extension, Json, Router};
use exchange_core::models::Balance;
use exchange_core::types::CallerIdentity;
use serde::Serialize;

use super::{map_err, ErrorResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub ticker: String,
    pub total: i64,
    pub reserved: i64,
    pub available: i64,
}

impl From<Balance> for BalanceResponse {
    fn from(b: Balance) -> Self {
        Self {
            available: b.available(),
            ticker: b.ticker,
            total: b.total,
            reserved: b.reserved,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub balances: Vec<BalanceResponse>,
}

pub fn balance_routes() -> Router<AppState> {
    Router::new().route("/", get(get_balances))
}

async fn get_balances(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<BalancesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let balances = state
        .gateway
        .get_balance(caller, caller.user_id)
        .await
        .map_err(map_err)?;

    Ok(Json(BalancesResponse {
        balances: balances.into_iter().map(BalanceResponse::from).collect(),
    }))
}
