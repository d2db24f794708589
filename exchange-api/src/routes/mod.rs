pub mod admin;
pub mod balances;
pub mod orderbook;
pub mod orders;
pub mod trades;

pub use admin::admin_routes;
pub use balances::balance_routes;
pub use orderbook::orderbook_routes;
pub use orders::order_routes;
pub use trades::trade_routes;

use axum::{http::StatusCode, Json};
use exchange_core::ExchangeError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
}

impl ErrorResponse {
    fn simple(msg: impl Into<String>) -> Self {
        Self { error: msg.into(), available: None, required: None }
    }
}

/// Maps the core's error taxonomy onto HTTP status codes (spec §7), the
/// same switch-on-variant shape as the teacher's `place_order` error
/// mapping in `accounts::routes::orders`.
pub fn map_err(err: ExchangeError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        ExchangeError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::simple(msg))),
        ExchangeError::NotFound(msg) => (StatusCode::NOT_FOUND, Json(ErrorResponse::simple(msg))),
        ExchangeError::Forbidden { resource, .. } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::simple(format!("not permitted to act on {resource}"))),
        ),
        ExchangeError::InsufficientFunds { ticker, available, required } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("insufficient {ticker} funds"),
                available: Some(available),
                required: Some(required),
            }),
        ),
        ExchangeError::InsufficientLiquidity { available, required } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "insufficient book liquidity".into(),
                available: Some(available),
                required: Some(required),
            }),
        ),
        ExchangeError::DuplicateOrder(id) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::simple(format!("order {id} already exists"))),
        ),
        ExchangeError::LedgerInvariantViolation(msg) => {
            tracing::error!("ledger invariant violation: {msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::simple("internal error")))
        }
        ExchangeError::Storage(e) => {
            tracing::error!("storage error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::simple("internal error")))
        }
    }
}
