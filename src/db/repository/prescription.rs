use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::{DispenseRecord, Drug, Prescription, PrescriptionStatus};

const PRESCRIPTION_COLUMNS: &str = "id, patient_id, prescribed_by, drug_id, medication_name,
     dosage, frequency, route, quantity, refills, instructions, start_date, end_date,
     dispensed_date, status, is_controlled, created_at, updated_at";

pub fn insert_drug(conn: &Connection, drug: &Drug) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO drugs (id, name, generic_name, strength, form, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            drug.id.to_string(),
            drug.name,
            drug.generic_name,
            drug.strength,
            drug.form,
            drug.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_drug(conn: &Connection, id: &Uuid) -> Result<Option<Drug>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, generic_name, strength, form, created_at FROM drugs WHERE id = ?1",
        params![id.to_string()],
        drug_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_drugs(conn: &Connection) -> Result<Vec<Drug>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, generic_name, strength, form, created_at FROM drugs ORDER BY name",
    )?;
    let rows = stmt.query_map([], drug_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn drug_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Drug> {
    Ok(Drug {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        generic_name: row.get(2)?,
        strength: row.get(3)?,
        form: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, patient_id, prescribed_by, drug_id, medication_name,
         dosage, frequency, route, quantity, refills, instructions, start_date, end_date,
         dispensed_date, status, is_controlled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18)",
        params![
            rx.id.to_string(),
            rx.patient_id.to_string(),
            rx.prescribed_by.to_string(),
            rx.drug_id.map(|id| id.to_string()),
            rx.medication_name,
            rx.dosage,
            rx.frequency.as_str(),
            rx.route.as_str(),
            rx.quantity,
            rx.refills,
            rx.instructions,
            rx.start_date,
            rx.end_date,
            rx.dispensed_date,
            rx.status.as_str(),
            rx.is_controlled,
            rx.created_at,
            rx.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1"),
        params![id.to_string()],
        prescription_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_all_prescriptions(conn: &Connection) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], prescription_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_prescriptions_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE patient_id = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], prescription_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_prescriptions_for_prescriber(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE prescribed_by = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], prescription_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Pharmacist work queue: everything still dispensable.
pub fn list_dispensable_prescriptions(
    conn: &Connection,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
         WHERE status IN ('active', 'partial') ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], prescription_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn prescription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        prescribed_by: uuid_col(row, 2)?,
        drug_id: opt_uuid_col(row, 3)?,
        medication_name: row.get(4)?,
        dosage: row.get(5)?,
        frequency: enum_col(row, 6)?,
        route: enum_col(row, 7)?,
        quantity: row.get(8)?,
        refills: row.get(9)?,
        instructions: row.get(10)?,
        start_date: row.get(11)?,
        end_date: row.get(12)?,
        dispensed_date: row.get(13)?,
        status: enum_col(row, 14)?,
        is_controlled: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

pub fn set_prescription_dispensed(
    conn: &Connection,
    id: &Uuid,
    status: PrescriptionStatus,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?1, dispensed_date = ?2, updated_at = ?2
         WHERE id = ?3",
        params![status.as_str(), at, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Prescription", id));
    }
    Ok(())
}

pub fn insert_dispense_record(
    conn: &Connection,
    record: &DispenseRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescription_dispenses (id, prescription_id, dispensed_by, quantity,
         notes, dispensed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.prescription_id.to_string(),
            record.dispensed_by.to_string(),
            record.quantity,
            record.notes,
            record.dispensed_at,
        ],
    )?;
    Ok(())
}

pub fn list_dispense_records(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<DispenseRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescription_id, dispensed_by, quantity, notes, dispensed_at
         FROM prescription_dispenses WHERE prescription_id = ?1 ORDER BY dispensed_at DESC",
    )?;
    let rows = stmt.query_map(params![prescription_id.to_string()], |row| {
        Ok(DispenseRecord {
            id: uuid_col(row, 0)?,
            prescription_id: uuid_col(row, 1)?,
            dispensed_by: uuid_col(row, 2)?,
            quantity: row.get(3)?,
            notes: row.get(4)?,
            dispensed_at: row.get(5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
