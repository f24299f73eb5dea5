//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the session in
//! the database, and injects [`AuthUser`] into request extensions for
//! downstream handlers. Deactivated accounts are rejected even when
//! they still hold a valid token.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::accounts;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;

/// Require a valid session token.
///
/// Accesses `ApiContext` from request extensions (injected by the
/// Extension layer). On success the resolved `AuthUser` is available
/// to handlers as an extension.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let token_hash = accounts::hash_token(&token);
    let user = {
        let conn = ctx.conn()?;
        let (user, is_active) = repository::session_user(&conn, &token_hash)?
            .ok_or(ApiError::Unauthorized)?;
        if !is_active {
            return Err(ApiError::Forbidden("account is deactivated".into()));
        }
        repository::touch_session(&conn, &token_hash, Utc::now().naive_utc())?;
        user
    }; // MutexGuard dropped here, before the await

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
