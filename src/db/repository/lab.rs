use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::{LabOrder, LabOrderStatus, LabResultEntry, LabTestType};

const ORDER_COLUMNS: &str = "id, patient_id, ordered_by, test_type_id, priority, status,
     clinical_notes, collection_date, collection_site, collected_by, created_at, updated_at";

pub fn insert_test_type(conn: &Connection, tt: &LabTestType) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_test_types (id, name, category, description, unit,
         reference_range_min, reference_range_max, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tt.id.to_string(),
            tt.name,
            tt.category.as_str(),
            tt.description,
            tt.unit,
            tt.reference_range_min,
            tt.reference_range_max,
            tt.is_active,
            tt.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_test_type(conn: &Connection, id: &Uuid) -> Result<Option<LabTestType>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, category, description, unit, reference_range_min,
         reference_range_max, is_active, created_at
         FROM lab_test_types WHERE id = ?1",
        params![id.to_string()],
        test_type_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Active test types, ordered for the selector.
pub fn list_test_types(conn: &Connection) -> Result<Vec<LabTestType>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, description, unit, reference_range_min,
         reference_range_max, is_active, created_at
         FROM lab_test_types WHERE is_active = 1 ORDER BY category, name",
    )?;
    let rows = stmt.query_map([], test_type_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn test_type_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabTestType> {
    Ok(LabTestType {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        category: enum_col(row, 2)?,
        description: row.get(3)?,
        unit: row.get(4)?,
        reference_range_min: row.get(5)?,
        reference_range_max: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_lab_order(conn: &Connection, order: &LabOrder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_orders (id, patient_id, ordered_by, test_type_id, priority, status,
         clinical_notes, collection_date, collection_site, collected_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            order.id.to_string(),
            order.patient_id.to_string(),
            order.ordered_by.to_string(),
            order.test_type_id.to_string(),
            order.priority.as_str(),
            order.status.as_str(),
            order.clinical_notes,
            order.collection_date,
            order.collection_site,
            order.collected_by.map(|id| id.to_string()),
            order.created_at,
            order.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_lab_order(conn: &Connection, id: &Uuid) -> Result<Option<LabOrder>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM lab_orders WHERE id = ?1"),
        params![id.to_string()],
        order_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_all_lab_orders(conn: &Connection) -> Result<Vec<LabOrder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ORDER_COLUMNS} FROM lab_orders ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], order_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_lab_orders_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<LabOrder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ORDER_COLUMNS} FROM lab_orders WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], order_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_lab_orders_for_orderer(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<LabOrder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ORDER_COLUMNS} FROM lab_orders WHERE ordered_by = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], order_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabOrder> {
    Ok(LabOrder {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        ordered_by: uuid_col(row, 2)?,
        test_type_id: uuid_col(row, 3)?,
        priority: enum_col(row, 4)?,
        status: enum_col(row, 5)?,
        clinical_notes: row.get(6)?,
        collection_date: row.get(7)?,
        collection_site: row.get(8)?,
        collected_by: opt_uuid_col(row, 9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn set_lab_order_status(
    conn: &Connection,
    id: &Uuid,
    status: LabOrderStatus,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("LabOrder", id));
    }
    Ok(())
}

pub fn set_lab_order_collected(
    conn: &Connection,
    id: &Uuid,
    collected_by: &Uuid,
    site: Option<&str>,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_orders SET status = 'collected', collected_by = ?1, collection_site = ?2,
         collection_date = ?3, updated_at = ?3 WHERE id = ?4",
        params![collected_by.to_string(), site, at, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("LabOrder", id));
    }
    Ok(())
}

pub fn insert_lab_result(conn: &Connection, result: &LabResultEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_results (id, lab_order_id, parameter, value, unit, reference_range,
         is_abnormal, notes, recorded_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            result.id.to_string(),
            result.lab_order_id.to_string(),
            result.parameter,
            result.value,
            result.unit,
            result.reference_range,
            result.is_abnormal,
            result.notes,
            result.recorded_by.to_string(),
            result.created_at,
        ],
    )?;
    Ok(())
}

pub fn list_lab_results(
    conn: &Connection,
    lab_order_id: &Uuid,
) -> Result<Vec<LabResultEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, lab_order_id, parameter, value, unit, reference_range, is_abnormal,
         notes, recorded_by, created_at
         FROM lab_results WHERE lab_order_id = ?1 ORDER BY parameter",
    )?;
    let rows = stmt.query_map(params![lab_order_id.to_string()], |row| {
        Ok(LabResultEntry {
            id: uuid_col(row, 0)?,
            lab_order_id: uuid_col(row, 1)?,
            parameter: row.get(2)?,
            value: row.get(3)?,
            unit: row.get(4)?,
            reference_range: row.get(5)?,
            is_abnormal: row.get(6)?,
            notes: row.get(7)?,
            recorded_by: uuid_col(row, 8)?,
            created_at: row.get(9)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
