use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use exchange_core::models::order::Order;
use exchange_core::types::{CallerIdentity, Direction, OrderKind, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{map_err, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub ticker: String,
    pub direction: Direction,
    pub kind: OrderKind,
    pub qty: i64,
    pub price: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub kind: OrderKind,
    pub qty: i64,
    pub price: Option<i64>,
    pub filled: i64,
    pub status: OrderStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            user_id: o.user_id,
            ticker: o.ticker,
            direction: o.direction,
            kind: o.kind,
            qty: o.qty,
            price: o.price,
            filled: o.filled,
            status: o.status,
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OrdersListResponse {
    pub orders: Vec<OrderResponse>,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/", get(list_orders))
        .route("/:order_id", get(get_order))
        .route("/:order_id", delete(cancel_order))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrdersListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let target = query.user_id.unwrap_or(caller.user_id);
    let orders = state
        .gateway
        .list_orders_for_user(caller, target)
        .await
        .map_err(map_err)?;
    Ok(Json(OrdersListResponse {
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

async fn place_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .gateway
        .submit_order(caller, &req.ticker, req.direction, req.kind, req.qty, req.price)
        .await
        .map_err(map_err)?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state.gateway.get_order(caller, order_id).await.map_err(map_err)?;
    Ok(Json(order.into()))
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state.gateway.cancel_order(caller, order_id).await.map_err(map_err)?;
    Ok(Json(order.into()))
}
