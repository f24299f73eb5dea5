use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AllergySeverity, Gender};

/// Patient profile, 1:1 with a patient-role user. Anchor for all
/// clinical records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// SOAP-structured note authored by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allergy {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub allergen: String,
    pub reaction: String,
    pub severity: AllergySeverity,
    pub created_at: NaiveDateTime,
}

/// Medication entry on the patient summary (distinct from the
/// prescription workflow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientMedication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub prescribed_date: NaiveDate,
    pub active: bool,
}
