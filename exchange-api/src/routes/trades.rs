use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use exchange_core::models::Trade;
use exchange_core::types::CallerIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{map_err, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub ticker: Option<String>,
    pub user_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub id: Uuid,
    pub ticker: String,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub qty: i64,
    pub price: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Trade> for TradeResponse {
    fn from(t: Trade) -> Self {
        Self {
            id: t.id,
            ticker: t.ticker,
            maker_order_id: t.maker_order_id,
            taker_order_id: t.taker_order_id,
            buyer_id: t.buyer_id,
            seller_id: t.seller_id,
            qty: t.qty,
            price: t.price,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TradesListResponse {
    pub trades: Vec<TradeResponse>,
}

pub fn trade_routes() -> Router<AppState> {
    Router::new().route("/", get(list_trades))
}

/// Scoped to the caller's own trades unless the caller is an ADMIN and
/// explicitly asks for another user's via `user_id`.
async fn list_trades(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<TradesListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = match query.user_id {
        Some(uid) if caller.may_act_as(uid) => Some(uid),
        Some(_) => return Err(map_err(exchange_core::ExchangeError::Forbidden {
            caller: caller.user_id,
            resource: "another user's trades".into(),
        })),
        None => Some(caller.user_id),
    };

    let trades = state
        .gateway
        .list_trades(user_id, query.ticker.as_deref(), query.limit)
        .await
        .map_err(map_err)?;

    Ok(Json(TradesListResponse {
        trades: trades.into_iter().map(TradeResponse::from).collect(),
    }))
}
