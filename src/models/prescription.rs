use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DoseFrequency, MedicationRoute, PrescriptionStatus};

/// Master list entry for a dispensable drug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drug {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub strength: String,
    pub form: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub prescribed_by: Uuid,
    pub drug_id: Option<Uuid>,
    /// Free-text name when the drug is not in the master list.
    pub medication_name: String,
    pub dosage: String,
    pub frequency: DoseFrequency,
    pub route: MedicationRoute,
    pub quantity: i64,
    pub refills: i64,
    pub instructions: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub dispensed_date: Option<NaiveDateTime>,
    pub status: PrescriptionStatus,
    pub is_controlled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Record of a single dispense event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenseRecord {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub dispensed_by: Uuid,
    pub quantity: i64,
    pub notes: String,
    pub dispensed_at: NaiveDateTime,
}
