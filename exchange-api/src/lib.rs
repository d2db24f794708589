pub mod auth;
pub mod routes;

use std::sync::Arc;

use exchange_core::gateway::OrderGateway;
use sqlx::PgPool;

/// Shared application state, handed to every route via axum's `State`
/// extractor — the same role the teacher's `AppState` plays, trimmed down
/// to what this design's glue layer actually needs (no `jwt_secret`, no
/// mail service: auth here is a stored API-key hash, and there is no
/// email-driven workflow in scope).
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gateway: Arc<OrderGateway>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let gateway = Arc::new(OrderGateway::new(pool.clone()));
        Self { pool, gateway }
    }
}
