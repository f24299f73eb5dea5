//! Registration, login and current-identity endpoints.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;
use crate::models::{AuthUser, User};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub message: &'static str,
}

/// `POST /api/auth/register/patient` — self-service patient signup.
pub async fn register_patient(
    State(ctx): State<ApiContext>,
    Json(reg): Json<accounts::PatientRegistration>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let conn = ctx.conn()?;
    let user = accounts::register_patient(&conn, reg)?;
    Ok(Json(RegisterResponse {
        user,
        message: "Patient account created successfully",
    }))
}

/// `POST /api/auth/register/staff` — staff signup, pending verification.
pub async fn register_staff(
    State(ctx): State<ApiContext>,
    Json(reg): Json<accounts::StaffRegistration>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let conn = ctx.conn()?;
    let user = accounts::register_staff(&conn, reg)?;
    Ok(Json(RegisterResponse {
        user,
        message: "Staff account created successfully. Please wait for administrator verification",
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// `POST /api/auth/login` — verify credentials, mint a session token.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.conn()?;
    let outcome = accounts::login(&conn, &req.username, &req.password)?;
    Ok(Json(LoginResponse {
        user: outcome.user,
        token: outcome.token,
    }))
}

/// `GET /api/auth/me` — the authenticated account.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    let user = repository::get_user(&conn, &auth.id)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

/// `PATCH /api/auth/me` — update the caller's contact details.
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(update): Json<accounts::ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(accounts::update_profile(&conn, &auth, &update)?))
}
