//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::error;

use crate::web::state::AppState;

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let auth_session_id = cookie_header
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .store
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

/// Middleware guarding administrative routes with a single shared bearer
/// secret.
///
/// This is a placeholder credential scheme, not a real credential/session
/// system: the secret is config-only with no default, so an unset
/// `ADMIN_TOKEN` rejects every request.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
