//! User administration endpoints. Authorization is enforced inside the
//! accounts service; these handlers are thin HTTP adapters.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{AuthUser, User, UserStats};

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// `GET /api/admin/users` — all accounts, newest first.
pub async fn list_users(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UsersResponse>, ApiError> {
    let conn = ctx.conn()?;
    let users = accounts::list_users(&conn, &auth)?;
    Ok(Json(UsersResponse { users }))
}

/// `GET /api/admin/users/stats` — dashboard aggregates.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserStats>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::user_stats(&conn, &auth)?))
}

/// `GET /api/admin/users/:id`
pub async fn get_user(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::get_user_admin(&conn, &auth, &user_id)?))
}

/// `POST /api/admin/users/:id/verify`
pub async fn verify(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::verify_user(&conn, &auth, &user_id)?))
}

/// `POST /api/admin/users/:id/deactivate`
pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::deactivate(&conn, &auth, &user_id)?))
}

/// `POST /api/admin/users/:id/reactivate`
pub async fn reactivate(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::reactivate(&conn, &auth, &user_id)?))
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// `POST /api/admin/users/:id/update-role`
pub async fn update_role(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::change_role(&conn, &auth, &user_id, &req.role)?))
}
