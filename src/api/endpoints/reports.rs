//! Clinical reports and the admin statistics feed.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::{self, ReadScope, Resource};
use crate::db::repository;
use crate::models::{AuthUser, Report, ReportStatistics};

#[derive(Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
}

/// `GET /api/reports` — care roles see all, patients their own.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let reports = match authorization::read_scope(Resource::Reports, &auth) {
        ReadScope::All => repository::list_all_reports(&conn)?,
        ReadScope::OwnPatient(id) => repository::list_reports_for_patient(&conn, &id)?,
        _ => Vec::new(),
    };
    Ok(Json(ReportsResponse { reports }))
}

#[derive(Deserialize)]
pub struct NewReportRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub patient_id: Uuid,
}

/// `POST /api/reports`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewReportRequest>,
) -> Result<Json<Report>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Reports, &auth)?;
    repository::get_patient(&conn, &req.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    let now = Utc::now().naive_utc();
    let report = Report {
        id: Uuid::new_v4(),
        title: req.title,
        content: req.content,
        patient_id: req.patient_id,
        created_by: auth.id,
        created_at: now,
        updated_at: now,
    };
    repository::insert_report(&conn, &report)?;
    Ok(Json(report))
}

/// `GET /api/reports/:id` — the ownership re-check runs even though
/// list scoping exists, so a direct fetch cannot leak a foreign row.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, ApiError> {
    let conn = ctx.conn()?;
    let report = fetch(&conn, &id)?;
    authorization::check_object(Resource::Reports, &auth, &report.patient_id)?;
    Ok(Json(report))
}

#[derive(Deserialize, Default)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// `PATCH /api/reports/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReportRequest>,
) -> Result<Json<Report>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Reports, &auth)?;
    fetch(&conn, &id)?;
    repository::update_report(
        &conn,
        &id,
        req.title.as_deref(),
        req.content.as_deref(),
        Utc::now().naive_utc(),
    )?;
    Ok(Json(fetch(&conn, &id)?))
}

/// `GET /api/reports/statistics` — admin capability only.
pub async fn statistics(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ReportStatistics>, ApiError> {
    if !auth.role.can_manage_roles() {
        return Err(ApiError::Forbidden(
            "statistics are restricted to administrators".into(),
        ));
    }
    let conn = ctx.conn()?;
    Ok(Json(repository::report_statistics(
        &conn,
        Utc::now().naive_utc(),
    )?))
}

fn fetch(conn: &rusqlite::Connection, id: &Uuid) -> Result<Report, ApiError> {
    repository::get_report(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))
}
