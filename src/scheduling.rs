//! Appointment negotiation engine.
//!
//! A patient requests a time, the provider may counter-propose, either
//! side confirms, and the provider closes the visit out. Every
//! transition checks the caller's standing first, then the source
//! state, then applies status + fields + thread message in one
//! transaction. Rescheduling never edits the row in place: it spawns a
//! fresh `requested` appointment linked via `rescheduled_from`.
//!
//! Transitions:
//!   requested  --propose  (provider)-->           proposed
//!   requested/proposed --confirm (either)-->      confirmed
//!   requested/proposed/confirmed --cancel-->      cancelled
//!   confirmed  --complete (provider)-->           completed
//!   confirmed  --no_show  (provider)-->           no_show
//!   confirmed  --reschedule (either)-->           rescheduled (+ new row)

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, ReadScope, Resource};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::{
    Appointment, AppointmentFeedback, AppointmentMessage, AppointmentStatus, AppointmentType,
    AuthUser, ReminderDue, Role,
};

/// Display format for times quoted in thread messages.
const MESSAGE_TIME_FORMAT: &str = "%B %d, %Y at %I:%M %p";

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRequest {
    pub provider_id: Uuid,
    /// Required when the caller is not a patient; ignored otherwise.
    pub patient_id: Option<Uuid>,
    pub title: String,
    pub appointment_type: AppointmentType,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub patient_suggested_time: NaiveDateTime,
    pub estimated_duration_minutes: Option<i64>,
}

/// The caller's standing on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Provider,
    Patient,
    Admin,
}

// ─── Creation ─────────────────────────────────────────────────────────────────

/// Open a negotiation. Patients create for their own profile; verified
/// staff and admins may create on a patient's behalf.
pub fn request_appointment(
    conn: &Connection,
    actor: &AuthUser,
    req: AppointmentRequest,
) -> Result<Appointment, ServiceError> {
    let patient_id = if actor.role == Role::Patient {
        actor.patient_id.ok_or_else(|| {
            ServiceError::Validation("caller has no patient profile".into())
        })?
    } else {
        authorization::check_verified(actor)?;
        let id = req.patient_id.ok_or_else(|| {
            ServiceError::Validation("patient_id is required for staff-created appointments".into())
        })?;
        repository::get_patient(conn, &id)?
            .ok_or_else(|| ServiceError::NotFound("Patient".into()))?;
        id
    };

    let provider = repository::get_user(conn, &req.provider_id)?
        .ok_or_else(|| ServiceError::NotFound("Provider".into()))?;
    if !provider.role.is_medical_staff() {
        return Err(ServiceError::Validation(
            "provider must be a medical staff user".into(),
        ));
    }

    let now = Utc::now().naive_utc();
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        provider_id: provider.id,
        title: req.title,
        appointment_type: req.appointment_type,
        description: req.description.unwrap_or_default(),
        reason: req.reason.unwrap_or_default(),
        patient_suggested_time: req.patient_suggested_time,
        provider_proposed_time: None,
        confirmed_time: None,
        actual_start_time: None,
        actual_end_time: None,
        estimated_duration_minutes: req.estimated_duration_minutes.unwrap_or(30),
        status: AppointmentStatus::Requested,
        cancellation_reason: None,
        rescheduled_from: None,
        reminder_sent: false,
        reminder_sent_at: None,
        created_by: Some(actor.id),
        created_at: now,
        updated_at: now,
    };
    repository::insert_appointment(conn, &appt)?;
    tracing::info!(appointment = %appt.id, patient = %patient_id, provider = %provider.id,
        "appointment requested");
    Ok(appt)
}

// ─── Reads ────────────────────────────────────────────────────────────────────

pub fn list_appointments(
    conn: &Connection,
    actor: &AuthUser,
) -> Result<Vec<Appointment>, ServiceError> {
    let rows = match authorization::read_scope(Resource::Appointments, actor) {
        ReadScope::All => repository::list_all_appointments(conn)?,
        ReadScope::AsProvider(id) => repository::list_appointments_for_provider(conn, &id)?,
        ReadScope::OwnPatient(id) => repository::list_appointments_for_patient(conn, &id)?,
        ReadScope::Nothing => Vec::new(),
    };
    Ok(rows)
}

/// Fetch one appointment the caller participates in (or administers).
pub fn get_appointment(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    party(&appt, actor)?;
    Ok(appt)
}

// ─── Transitions ──────────────────────────────────────────────────────────────

/// Provider counter-proposes a time for a requested appointment.
pub fn propose_time(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
    proposed: NaiveDateTime,
) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(&appt, actor, &[Party::Provider], "propose a time for")?;
    require_status(&appt, &[AppointmentStatus::Requested], "propose a time for")?;

    let now = Utc::now().naive_utc();
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::set_proposed(&tx, id, proposed, now)?;
    log_message(
        &tx,
        &appt,
        actor,
        format!(
            "Provider proposed new time: {}",
            proposed.format(MESSAGE_TIME_FORMAT)
        ),
        now,
    )?;
    tx.commit().map_err(db_err)?;
    fetch(conn, id)
}

/// Confirm a requested or proposed appointment. Without an explicit
/// time the provider's proposal wins, then the patient's suggestion —
/// a successful confirm never leaves `confirmed_time` empty.
pub fn confirm(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
    explicit_time: Option<NaiveDateTime>,
) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(&appt, actor, &[Party::Provider, Party::Patient], "confirm")?;
    require_status(
        &appt,
        &[AppointmentStatus::Requested, AppointmentStatus::Proposed],
        "confirm",
    )?;

    let confirmed = explicit_time
        .or(appt.provider_proposed_time)
        .unwrap_or(appt.patient_suggested_time);

    let now = Utc::now().naive_utc();
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::set_confirmed(&tx, id, confirmed, now)?;
    log_message(
        &tx,
        &appt,
        actor,
        format!(
            "Appointment confirmed for {}",
            confirmed.format(MESSAGE_TIME_FORMAT)
        ),
        now,
    )?;
    tx.commit().map_err(db_err)?;
    fetch(conn, id)
}

/// Cancel before completion. Participants and admin roles may cancel;
/// the reason is kept on the row and echoed into the thread.
pub fn cancel(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
    reason: &str,
) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(
        &appt,
        actor,
        &[Party::Provider, Party::Patient, Party::Admin],
        "cancel",
    )?;
    require_status(
        &appt,
        &[
            AppointmentStatus::Requested,
            AppointmentStatus::Proposed,
            AppointmentStatus::Confirmed,
        ],
        "cancel",
    )?;

    let now = Utc::now().naive_utc();
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::set_cancelled(&tx, id, reason, now)?;
    log_message(
        &tx,
        &appt,
        actor,
        format!("Appointment cancelled. Reason: {reason}"),
        now,
    )?;
    tx.commit().map_err(db_err)?;
    fetch(conn, id)
}

/// Provider marks a confirmed visit as held.
pub fn complete(conn: &Connection, actor: &AuthUser, id: &Uuid) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(&appt, actor, &[Party::Provider], "complete")?;
    require_status(&appt, &[AppointmentStatus::Confirmed], "complete")?;

    let now = Utc::now().naive_utc();
    repository::set_completed(conn, id, now, now)?;
    fetch(conn, id)
}

/// Provider records that the patient did not attend.
pub fn mark_no_show(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<Appointment, ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(&appt, actor, &[Party::Provider], "mark no-show on")?;
    require_status(&appt, &[AppointmentStatus::Confirmed], "mark no-show on")?;

    let now = Utc::now().naive_utc();
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::set_no_show(&tx, id, now)?;
    log_message(&tx, &appt, actor, "Patient did not attend".to_string(), now)?;
    tx.commit().map_err(db_err)?;
    fetch(conn, id)
}

/// Replace a confirmed appointment with a fresh request for a new
/// time. The old row becomes terminal (`rescheduled`) and the new row
/// points back at it, so the chain only ever grows forward.
pub fn reschedule(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
    new_time: NaiveDateTime,
) -> Result<(Appointment, Appointment), ServiceError> {
    let appt = fetch(conn, id)?;
    require_party(&appt, actor, &[Party::Provider, Party::Patient], "reschedule")?;
    require_status(&appt, &[AppointmentStatus::Confirmed], "reschedule")?;

    let now = Utc::now().naive_utc();
    let replacement = Appointment {
        id: Uuid::new_v4(),
        patient_id: appt.patient_id,
        provider_id: appt.provider_id,
        title: appt.title.clone(),
        appointment_type: appt.appointment_type,
        description: appt.description.clone(),
        reason: appt.reason.clone(),
        patient_suggested_time: new_time,
        provider_proposed_time: None,
        confirmed_time: None,
        actual_start_time: None,
        actual_end_time: None,
        estimated_duration_minutes: appt.estimated_duration_minutes,
        status: AppointmentStatus::Requested,
        cancellation_reason: None,
        rescheduled_from: Some(appt.id),
        reminder_sent: false,
        reminder_sent_at: None,
        created_by: Some(actor.id),
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::insert_appointment(&tx, &replacement)?;
    repository::set_rescheduled(&tx, id, now)?;
    log_message(
        &tx,
        &appt,
        actor,
        format!(
            "Appointment rescheduled to {}",
            new_time.format(MESSAGE_TIME_FORMAT)
        ),
        now,
    )?;
    tx.commit().map_err(db_err)?;

    let old = fetch(conn, id)?;
    let new = fetch(conn, &replacement.id)?;
    tracing::info!(old = %old.id, new = %new.id, "appointment rescheduled");
    Ok((old, new))
}

// ─── Messages ─────────────────────────────────────────────────────────────────

pub fn add_message(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
    body: &str,
) -> Result<AppointmentMessage, ServiceError> {
    if body.trim().is_empty() {
        return Err(ServiceError::Validation("message body is empty".into()));
    }
    let appt = fetch(conn, appointment_id)?;
    party(&appt, actor)?;

    let msg = AppointmentMessage {
        id: Uuid::new_v4(),
        appointment_id: appt.id,
        sender_id: actor.id,
        body: body.to_string(),
        is_read: false,
        read_at: None,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_message(conn, &msg)?;
    Ok(msg)
}

pub fn list_messages(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentMessage>, ServiceError> {
    let appt = fetch(conn, appointment_id)?;
    party(&appt, actor)?;
    Ok(repository::list_messages(conn, appointment_id)?)
}

pub fn mark_message_read(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
    message_id: &Uuid,
) -> Result<AppointmentMessage, ServiceError> {
    let appt = fetch(conn, appointment_id)?;
    party(&appt, actor)?;
    let msg = repository::get_message(conn, message_id)?
        .ok_or_else(|| ServiceError::NotFound("AppointmentMessage".into()))?;
    if msg.appointment_id != appt.id {
        return Err(ServiceError::NotFound("AppointmentMessage".into()));
    }
    repository::mark_message_read(conn, message_id, Utc::now().naive_utc())?;
    repository::get_message(conn, message_id)?
        .ok_or_else(|| ServiceError::NotFound("AppointmentMessage".into()))
}

// ─── Feedback ─────────────────────────────────────────────────────────────────

/// Patient rating after a completed visit. One per appointment; the
/// unique index turns a duplicate into a conflict.
pub fn submit_feedback(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
    rating: i64,
    comment: &str,
) -> Result<AppointmentFeedback, ServiceError> {
    if !(1..=5).contains(&rating) {
        return Err(ServiceError::Validation("rating must be 1-5".into()));
    }
    let appt = fetch(conn, appointment_id)?;
    if party(&appt, actor)? != Party::Patient {
        return Err(ServiceError::Authorization(
            "only the appointment's patient may leave feedback".into(),
        ));
    }
    if appt.status != AppointmentStatus::Completed {
        return Err(ServiceError::State(
            "feedback is only accepted on completed appointments".into(),
        ));
    }

    let feedback = AppointmentFeedback {
        id: Uuid::new_v4(),
        appointment_id: appt.id,
        rating,
        comment: comment.to_string(),
        submitted_by: actor.id,
        submitted_at: Utc::now().naive_utc(),
    };
    repository::insert_feedback(conn, &feedback).map_err(|err| match err {
        crate::db::DatabaseError::ConstraintViolation(_) => {
            ServiceError::Conflict("feedback already submitted for this appointment".into())
        }
        other => other.into(),
    })?;
    Ok(feedback)
}

pub fn get_feedback(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
) -> Result<Option<AppointmentFeedback>, ServiceError> {
    let appt = fetch(conn, appointment_id)?;
    party(&appt, actor)?;
    Ok(repository::get_feedback(conn, appointment_id)?)
}

// ─── Reminders ────────────────────────────────────────────────────────────────

/// Confirmed appointments whose time falls inside the look-ahead
/// window and which have no reminder dispatched yet. For the external
/// notification poller; admin capability required.
pub fn reminders_due(
    conn: &Connection,
    actor: &AuthUser,
    window_hours: i64,
) -> Result<Vec<ReminderDue>, ServiceError> {
    require_admin(actor, "poll reminders")?;
    let from = Utc::now().naive_utc();
    let until = from + chrono::Duration::hours(window_hours.max(0));
    Ok(repository::reminders_due(conn, from, until)?)
}

pub fn mark_reminder_sent(
    conn: &Connection,
    actor: &AuthUser,
    appointment_id: &Uuid,
) -> Result<(), ServiceError> {
    require_admin(actor, "mark reminders sent")?;
    repository::mark_reminder_sent(conn, appointment_id, Utc::now().naive_utc())?;
    Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn fetch(conn: &Connection, id: &Uuid) -> Result<Appointment, ServiceError> {
    repository::get_appointment(conn, id)?
        .ok_or_else(|| ServiceError::NotFound("Appointment".into()))
}

fn party(appt: &Appointment, actor: &AuthUser) -> Result<Party, ServiceError> {
    if appt.provider_id == actor.id {
        return Ok(Party::Provider);
    }
    if actor.patient_id == Some(appt.patient_id) {
        return Ok(Party::Patient);
    }
    if actor.role.can_manage_roles() {
        return Ok(Party::Admin);
    }
    Err(ServiceError::Authorization(
        "not a participant in this appointment".into(),
    ))
}

fn require_party(
    appt: &Appointment,
    actor: &AuthUser,
    allowed: &[Party],
    action: &str,
) -> Result<(), ServiceError> {
    let who = party(appt, actor)?;
    if allowed.contains(&who) {
        Ok(())
    } else {
        Err(ServiceError::Authorization(format!(
            "caller may not {action} this appointment"
        )))
    }
}

fn require_status(
    appt: &Appointment,
    allowed: &[AppointmentStatus],
    action: &str,
) -> Result<(), ServiceError> {
    if allowed.contains(&appt.status) {
        Ok(())
    } else {
        Err(ServiceError::State(format!(
            "cannot {action} an appointment in status {}",
            appt.status.as_str()
        )))
    }
}

fn require_admin(actor: &AuthUser, action: &str) -> Result<(), ServiceError> {
    if actor.role.can_manage_roles() {
        Ok(())
    } else {
        Err(ServiceError::Authorization(format!("caller may not {action}")))
    }
}

fn log_message(
    conn: &Connection,
    appt: &Appointment,
    sender: &AuthUser,
    body: String,
    now: NaiveDateTime,
) -> Result<(), ServiceError> {
    repository::insert_message(
        conn,
        &AppointmentMessage {
            id: Uuid::new_v4(),
            appointment_id: appt.id,
            sender_id: sender.id,
            body,
            is_read: false,
            read_at: None,
            created_at: now,
        },
    )?;
    Ok(())
}

fn db_err(err: rusqlite::Error) -> ServiceError {
    ServiceError::from(crate::db::DatabaseError::from(err))
}
