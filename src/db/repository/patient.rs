use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::{Allergy, ClinicalNote, Patient, PatientMedication};

const PATIENT_COLUMNS: &str =
    "id, user_id, date_of_birth, gender, phone, address, emergency_contact, created_at, updated_at";

fn patient_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        date_of_birth: row.get(2)?,
        gender: enum_col(row, 3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        emergency_contact: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, user_id, date_of_birth, gender, phone, address,
         emergency_contact, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient.id.to_string(),
            patient.user_id.to_string(),
            patient.date_of_birth,
            patient.gender.as_str(),
            patient.phone,
            patient.address,
            patient.emergency_contact,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id.to_string()],
        patient_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_patient_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = ?1"),
        params![user_id.to_string()],
        patient_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], patient_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Demographic fields a profile update may change.
#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    update: &PatientUpdate,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET
             phone = COALESCE(?1, phone),
             address = COALESCE(?2, address),
             emergency_contact = COALESCE(?3, emergency_contact),
             date_of_birth = COALESCE(?4, date_of_birth),
             updated_at = ?5
         WHERE id = ?6",
        params![
            update.phone,
            update.address,
            update.emergency_contact,
            update.date_of_birth,
            now,
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}

// ── Clinical notes ──────────────────────────────────────────

pub fn insert_clinical_note(conn: &Connection, note: &ClinicalNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinical_notes (id, patient_id, provider_id, subjective, objective,
         assessment, plan, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.provider_id.to_string(),
            note.subjective,
            note.objective,
            note.assessment,
            note.plan,
            note.created_at,
            note.updated_at,
        ],
    )?;
    Ok(())
}

pub fn list_clinical_notes(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ClinicalNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, provider_id, subjective, objective, assessment, plan,
         created_at, updated_at
         FROM clinical_notes WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(ClinicalNote {
            id: uuid_col(row, 0)?,
            patient_id: uuid_col(row, 1)?,
            provider_id: uuid_col(row, 2)?,
            subjective: row.get(3)?,
            objective: row.get(4)?,
            assessment: row.get(5)?,
            plan: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

// ── Allergies ───────────────────────────────────────────────

pub fn insert_allergy(conn: &Connection, allergy: &Allergy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO allergies (id, patient_id, allergen, reaction, severity, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            allergy.id.to_string(),
            allergy.patient_id.to_string(),
            allergy.allergen,
            allergy.reaction,
            allergy.severity.as_str(),
            allergy.created_at,
        ],
    )?;
    Ok(())
}

pub fn list_allergies(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Allergy>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, allergen, reaction, severity, created_at
         FROM allergies WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(Allergy {
            id: uuid_col(row, 0)?,
            patient_id: uuid_col(row, 1)?,
            allergen: row.get(2)?,
            reaction: row.get(3)?,
            severity: enum_col(row, 4)?,
            created_at: row.get(5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

// ── Patient medications ─────────────────────────────────────

pub fn insert_patient_medication(
    conn: &Connection,
    med: &PatientMedication,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_medications (id, patient_id, name, dosage, frequency,
         prescribed_date, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            med.id.to_string(),
            med.patient_id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            med.prescribed_date,
            med.active,
        ],
    )?;
    Ok(())
}

pub fn list_patient_medications(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<PatientMedication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, name, dosage, frequency, prescribed_date, active
         FROM patient_medications WHERE patient_id = ?1 ORDER BY prescribed_date DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(PatientMedication {
            id: uuid_col(row, 0)?,
            patient_id: uuid_col(row, 1)?,
            name: row.get(2)?,
            dosage: row.get(3)?,
            frequency: row.get(4)?,
            prescribed_date: row.get(5)?,
            active: row.get(6)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::{AllergySeverity, Gender};

    fn seed_patient(conn: &Connection) -> Patient {
        let user_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, email, role, created_at)
             VALUES (?1, ?2, 'x', 'p@x', 'patient', '2026-01-01T00:00:00')",
            params![user_id.to_string(), format!("user-{user_id}")],
        )
        .unwrap();
        let now = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            gender: Gender::Female,
            phone: None,
            address: None,
            emergency_contact: None,
            created_at: now,
            updated_at: now,
        };
        insert_patient(conn, &patient).unwrap();
        patient
    }

    fn seed_provider(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, email, role, work_id, created_at)
             VALUES (?1, ?2, 'x', 'd@x', 'doctor', ?3, '2026-01-01T00:00:00')",
            params![id.to_string(), format!("doc-{id}"), format!("W-{id}")],
        )
        .unwrap();
        id
    }

    #[test]
    fn patient_round_trip_by_id_and_user() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);

        let by_id = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(by_id.gender, Gender::Female);

        let by_user = get_patient_by_user(&conn, &patient.user_id).unwrap().unwrap();
        assert_eq!(by_user.id, patient.id);
    }

    #[test]
    fn second_profile_for_same_user_rejected() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let mut dup = patient.clone();
        dup.id = Uuid::new_v4();
        let err = insert_patient(&conn, &dup).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn update_patches_only_given_fields() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);

        update_patient(
            &conn,
            &patient.id,
            &PatientUpdate {
                phone: Some("555-0100".into()),
                ..Default::default()
            },
            patient.created_at,
        )
        .unwrap();

        let updated = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.date_of_birth, patient.date_of_birth);
    }

    #[test]
    fn clinical_records_scoped_to_patient() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let other = seed_patient(&conn);
        let provider = seed_provider(&conn);
        let now = patient.created_at;

        insert_clinical_note(
            &conn,
            &ClinicalNote {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                provider_id: provider,
                subjective: "Headache for two days".into(),
                objective: "BP 120/80".into(),
                assessment: "Tension headache".into(),
                plan: "Hydration, follow-up in a week".into(),
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();

        insert_allergy(
            &conn,
            &Allergy {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                allergen: "Penicillin".into(),
                reaction: "Hives".into(),
                severity: AllergySeverity::Moderate,
                created_at: now,
            },
        )
        .unwrap();

        assert_eq!(list_clinical_notes(&conn, &patient.id).unwrap().len(), 1);
        assert_eq!(list_clinical_notes(&conn, &other.id).unwrap().len(), 0);
        assert_eq!(list_allergies(&conn, &patient.id).unwrap().len(), 1);
        assert_eq!(list_allergies(&conn, &other.id).unwrap().len(), 0);
    }
}
