use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use exchange_core::models::user::User;
use exchange_core::types::CallerIdentity;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn unauthorized(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse { error: msg.into() }))
}

/// Bearer-token auth (spec §6: "the core receives an authenticated caller
/// identity"). The glue layer's entire job is turning the raw `Authorization`
/// header into a `CallerIdentity` — it never parses credentials itself,
/// mirroring the teacher's `auth_middleware` but swapping JWT verification
/// for a stored sha256(api_key) lookup, since this design has no session
/// or refresh-token lifecycle in scope.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("missing authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("expected a Bearer token"))?;

    let user = User::find_by_api_key(&state.pool, token)
        .await
        .map_err(|e| {
            tracing::error!("api key lookup failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "internal error".into() }),
            )
        })?
        .ok_or_else(|| unauthorized("invalid api key"))?;

    let identity = CallerIdentity { user_id: user.id, role: user.role };
    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
