use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, AppointmentType};

/// One scheduling negotiation between a patient and a provider.
///
/// `patient_suggested_time`, `provider_proposed_time` and `confirmed_time`
/// record the negotiation history; which one is authoritative for display
/// is governed by `status`. `rescheduled_from` links a spawned appointment
/// back to the row it replaced (forward-only chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub title: String,
    pub appointment_type: AppointmentType,
    pub description: String,
    pub reason: String,
    pub patient_suggested_time: NaiveDateTime,
    pub provider_proposed_time: Option<NaiveDateTime>,
    pub confirmed_time: Option<NaiveDateTime>,
    pub actual_start_time: Option<NaiveDateTime>,
    pub actual_end_time: Option<NaiveDateTime>,
    pub estimated_duration_minutes: i64,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub rescheduled_from: Option<Uuid>,
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<NaiveDateTime>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Append-only message on an appointment thread, ordered by creation
/// time. Every state transition logs one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentMessage {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Patient rating for a completed appointment. One per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentFeedback {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub rating: i64,
    pub comment: String,
    pub submitted_by: Uuid,
    pub submitted_at: NaiveDateTime,
}

/// Due-reminder projection polled by the external notification
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDue {
    pub appointment_id: Uuid,
    pub patient_user_id: Uuid,
    pub provider_id: Uuid,
    pub confirmed_time: NaiveDateTime,
}
