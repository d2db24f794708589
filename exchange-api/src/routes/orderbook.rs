use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{map_err, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    #[serde(default = "default_depth")]
    pub depth: i64,
}

fn default_depth() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct OrderBookResponse {
    pub ticker: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug, Serialize)]
pub struct PriceLevel {
    pub price: i64,
    pub qty: i64,
}

pub fn orderbook_routes() -> Router<AppState> {
    Router::new().route("/:ticker", get(get_orderbook))
}

async fn get_orderbook(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<OrderBookResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (bids, asks) = state
        .gateway
        .get_orderbook(&ticker, query.depth)
        .await
        .map_err(map_err)?;

    Ok(Json(OrderBookResponse {
        ticker,
        bids: bids.into_iter().map(|(price, qty)| PriceLevel { price, qty }).collect(),
        asks: asks.into_iter().map(|(price, qty)| PriceLevel { price, qty }).collect(),
    }))
}
