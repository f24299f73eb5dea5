//! Audit logging middleware.
//!
//! Logs every authenticated request with username, role, method, path
//! and response status. Runs innermost, after auth has injected the
//! identity.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::models::AuthUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let identity = req
        .extensions()
        .get::<AuthUser>()
        .map(|u| (u.username.clone(), u.role.as_str()));

    let response = next.run(req).await;

    let status = response.status().as_u16();
    match identity {
        Some((username, role)) => {
            tracing::info!(target: "audit", %username, role, %method, %path, status, "access");
        }
        None => {
            tracing::info!(target: "audit", %method, %path, status, "access (unauthenticated)");
        }
    }
    response
}
