use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentFeedback, AppointmentMessage, ReminderDue};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, provider_id, title, appointment_type,
     description, reason, patient_suggested_time, provider_proposed_time, confirmed_time,
     actual_start_time, actual_end_time, estimated_duration_minutes, status,
     cancellation_reason, rescheduled_from, reminder_sent, reminder_sent_at,
     created_by, created_at, updated_at";

fn appointment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        provider_id: uuid_col(row, 2)?,
        title: row.get(3)?,
        appointment_type: enum_col(row, 4)?,
        description: row.get(5)?,
        reason: row.get(6)?,
        patient_suggested_time: row.get(7)?,
        provider_proposed_time: row.get(8)?,
        confirmed_time: row.get(9)?,
        actual_start_time: row.get(10)?,
        actual_end_time: row.get(11)?,
        estimated_duration_minutes: row.get(12)?,
        status: enum_col(row, 13)?,
        cancellation_reason: row.get(14)?,
        rescheduled_from: opt_uuid_col(row, 15)?,
        reminder_sent: row.get(16)?,
        reminder_sent_at: row.get(17)?,
        created_by: opt_uuid_col(row, 18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, provider_id, title, appointment_type,
         description, reason, patient_suggested_time, provider_proposed_time, confirmed_time,
         actual_start_time, actual_end_time, estimated_duration_minutes, status,
         cancellation_reason, rescheduled_from, reminder_sent, reminder_sent_at,
         created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.provider_id.to_string(),
            appt.title,
            appt.appointment_type.as_str(),
            appt.description,
            appt.reason,
            appt.patient_suggested_time,
            appt.provider_proposed_time,
            appt.confirmed_time,
            appt.actual_start_time,
            appt.actual_end_time,
            appt.estimated_duration_minutes,
            appt.status.as_str(),
            appt.cancellation_reason,
            appt.rescheduled_from.map(|id| id.to_string()),
            appt.reminder_sent,
            appt.reminder_sent_at,
            appt.created_by.map(|id| id.to_string()),
            appt.created_at,
            appt.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id.to_string()],
        appointment_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         ORDER BY patient_suggested_time DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map([], appointment_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = ?1
         ORDER BY patient_suggested_time DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], appointment_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_appointments_for_provider(
    conn: &Connection,
    provider_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE provider_id = ?1
         ORDER BY patient_suggested_time DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![provider_id.to_string()], appointment_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

// ── Transition writes ───────────────────────────────────────
// Callers (the scheduling engine) have already checked authorization
// and source state; these only apply the field changes.

pub fn set_proposed(
    conn: &Connection,
    id: &Uuid,
    proposed: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'proposed', provider_proposed_time = ?1,
         updated_at = ?2 WHERE id = ?3",
        params![proposed, now, id.to_string()],
    )
}

pub fn set_confirmed(
    conn: &Connection,
    id: &Uuid,
    confirmed: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'confirmed', confirmed_time = ?1, updated_at = ?2
         WHERE id = ?3",
        params![confirmed, now, id.to_string()],
    )
}

pub fn set_cancelled(
    conn: &Connection,
    id: &Uuid,
    reason: &str,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'cancelled', cancellation_reason = ?1,
         updated_at = ?2 WHERE id = ?3",
        params![reason, now, id.to_string()],
    )
}

pub fn set_completed(
    conn: &Connection,
    id: &Uuid,
    ended_at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'completed', actual_end_time = ?1, updated_at = ?2
         WHERE id = ?3",
        params![ended_at, now, id.to_string()],
    )
}

pub fn set_no_show(conn: &Connection, id: &Uuid, now: NaiveDateTime) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'no_show', updated_at = ?1 WHERE id = ?2",
        params![now, id.to_string()],
    )
}

pub fn set_rescheduled(
    conn: &Connection,
    id: &Uuid,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_row(
        conn,
        id,
        "UPDATE appointments SET status = 'rescheduled', updated_at = ?1 WHERE id = ?2",
        params![now, id.to_string()],
    )
}

fn update_row(
    conn: &Connection,
    id: &Uuid,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(sql, params)?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

// ── Messages ────────────────────────────────────────────────

pub fn insert_message(conn: &Connection, msg: &AppointmentMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_messages (id, appointment_id, sender_id, body, is_read,
         read_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            msg.id.to_string(),
            msg.appointment_id.to_string(),
            msg.sender_id.to_string(),
            msg.body,
            msg.is_read,
            msg.read_at,
            msg.created_at,
        ],
    )?;
    Ok(())
}

pub fn list_messages(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, sender_id, body, is_read, read_at, created_at
         FROM appointment_messages WHERE appointment_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], message_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn get_message(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AppointmentMessage>, DatabaseError> {
    conn.query_row(
        "SELECT id, appointment_id, sender_id, body, is_read, read_at, created_at
         FROM appointment_messages WHERE id = ?1",
        params![id.to_string()],
        message_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentMessage> {
    Ok(AppointmentMessage {
        id: uuid_col(row, 0)?,
        appointment_id: uuid_col(row, 1)?,
        sender_id: uuid_col(row, 2)?,
        body: row.get(3)?,
        is_read: row.get(4)?,
        read_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn mark_message_read(
    conn: &Connection,
    id: &Uuid,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointment_messages SET is_read = 1, read_at = ?1 WHERE id = ?2",
        params![at, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("AppointmentMessage", id));
    }
    Ok(())
}

// ── Feedback ────────────────────────────────────────────────

pub fn insert_feedback(
    conn: &Connection,
    feedback: &AppointmentFeedback,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_feedback (id, appointment_id, rating, comment, submitted_by,
         submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            feedback.id.to_string(),
            feedback.appointment_id.to_string(),
            feedback.rating,
            feedback.comment,
            feedback.submitted_by.to_string(),
            feedback.submitted_at,
        ],
    )?;
    Ok(())
}

pub fn get_feedback(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<AppointmentFeedback>, DatabaseError> {
    conn.query_row(
        "SELECT id, appointment_id, rating, comment, submitted_by, submitted_at
         FROM appointment_feedback WHERE appointment_id = ?1",
        params![appointment_id.to_string()],
        |row| {
            Ok(AppointmentFeedback {
                id: uuid_col(row, 0)?,
                appointment_id: uuid_col(row, 1)?,
                rating: row.get(2)?,
                comment: row.get(3)?,
                submitted_by: uuid_col(row, 4)?,
                submitted_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

// ── Reminders ───────────────────────────────────────────────

/// Confirmed appointments inside the look-ahead window that have not
/// had a reminder dispatched. Polled by the external notifier.
pub fn reminders_due(
    conn: &Connection,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<ReminderDue>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, p.user_id, a.provider_id, a.confirmed_time
         FROM appointments a
         JOIN patients p ON p.id = a.patient_id
         WHERE a.status = 'confirmed' AND a.reminder_sent = 0
           AND a.confirmed_time >= ?1 AND a.confirmed_time <= ?2
         ORDER BY a.confirmed_time ASC",
    )?;
    let rows = stmt.query_map(params![from, until], |row| {
        Ok(ReminderDue {
            appointment_id: uuid_col(row, 0)?,
            patient_user_id: uuid_col(row, 1)?,
            provider_id: uuid_col(row, 2)?,
            confirmed_time: row.get(3)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn mark_reminder_sent(
    conn: &Connection,
    id: &Uuid,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET reminder_sent = 1, reminder_sent_at = ?1 WHERE id = ?2",
        params![at, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}
