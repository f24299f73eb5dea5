//! Appointment negotiation endpoints: creation, the transition verbs,
//! the message thread, feedback and the reminder feed.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{
    Appointment, AppointmentFeedback, AppointmentMessage, AuthUser, ReminderDue,
};
use crate::scheduling;

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

/// `GET /api/appointments` — scoped to the caller.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let appointments = scheduling::list_appointments(&conn, &auth)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `POST /api/appointments` — open a negotiation.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<scheduling::AppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::request_appointment(&conn, &auth, req)?))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::get_appointment(&conn, &auth, &id)?))
}

// ── Transitions ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ProposeRequest {
    pub proposed_time: NaiveDateTime,
}

/// `POST /api/appointments/:id/propose`
pub async fn propose(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::propose_time(
        &conn,
        &auth,
        &id,
        req.proposed_time,
    )?))
}

#[derive(Deserialize, Default)]
pub struct ConfirmRequest {
    pub confirmed_time: Option<NaiveDateTime>,
}

/// `POST /api/appointments/:id/confirm`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::confirm(&conn, &auth, &id, req.confirmed_time)?))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// `POST /api/appointments/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::cancel(&conn, &auth, &id, &req.reason)?))
}

/// `POST /api/appointments/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::complete(&conn, &auth, &id)?))
}

/// `POST /api/appointments/:id/no-show`
pub async fn no_show(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::mark_no_show(&conn, &auth, &id)?))
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub new_time: NaiveDateTime,
}

#[derive(Serialize)]
pub struct RescheduleResponse {
    pub old: Appointment,
    pub new: Appointment,
}

/// `POST /api/appointments/:id/reschedule`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<RescheduleResponse>, ApiError> {
    let conn = ctx.conn()?;
    let (old, new) = scheduling::reschedule(&conn, &auth, &id, req.new_time)?;
    Ok(Json(RescheduleResponse { old, new }))
}

// ── Messages ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<AppointmentMessage>,
}

/// `GET /api/appointments/:id/messages`
pub async fn list_messages(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let conn = ctx.conn()?;
    let messages = scheduling::list_messages(&conn, &auth, &id)?;
    Ok(Json(MessagesResponse { messages }))
}

#[derive(Deserialize)]
pub struct NewMessageRequest {
    pub body: String,
}

/// `POST /api/appointments/:id/messages`
pub async fn add_message(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewMessageRequest>,
) -> Result<Json<AppointmentMessage>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::add_message(&conn, &auth, &id, &req.body)?))
}

/// `POST /api/appointments/:id/messages/:message_id/read`
pub async fn mark_message_read(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AppointmentMessage>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::mark_message_read(
        &conn,
        &auth,
        &id,
        &message_id,
    )?))
}

// ── Feedback ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// `POST /api/appointments/:id/feedback`
pub async fn submit_feedback(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<AppointmentFeedback>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::submit_feedback(
        &conn,
        &auth,
        &id,
        req.rating,
        &req.comment,
    )?))
}

/// `GET /api/appointments/:id/feedback`
pub async fn get_feedback(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<AppointmentFeedback>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(scheduling::get_feedback(&conn, &auth, &id)?))
}

// ── Reminders ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RemindersQuery {
    /// Look-ahead window in hours, default 24.
    pub window_hours: Option<i64>,
}

#[derive(Serialize)]
pub struct RemindersResponse {
    pub due: Vec<ReminderDue>,
}

/// `GET /api/appointments/reminders/due` — feed for the external
/// notification dispatcher.
pub async fn reminders_due(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    axum::extract::Query(query): axum::extract::Query<RemindersQuery>,
) -> Result<Json<RemindersResponse>, ApiError> {
    let conn = ctx.conn()?;
    let due = scheduling::reminders_due(&conn, &auth, query.window_hours.unwrap_or(24))?;
    Ok(Json(RemindersResponse { due }))
}

/// `POST /api/appointments/:id/reminder-sent`
pub async fn mark_reminder_sent(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = ctx.conn()?;
    scheduling::mark_reminder_sent(&conn, &auth, &id)?;
    Ok(Json(serde_json::json!({ "marked": true })))
}
