use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::uuid_col;
use crate::db::DatabaseError;
use crate::models::{Report, ReportStatistics};

const REPORT_COLUMNS: &str = "id, title, content, patient_id, created_by, created_at, updated_at";

fn report_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: uuid_col(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        patient_id: uuid_col(row, 3)?,
        created_by: uuid_col(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, title, content, patient_id, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.id.to_string(),
            report.title,
            report.content,
            report.patient_id.to_string(),
            report.created_by.to_string(),
            report.created_at,
            report.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
        params![id.to_string()],
        report_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_all_reports(conn: &Connection) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], report_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn list_reports_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], report_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn update_report(
    conn: &Connection,
    id: &Uuid,
    title: Option<&str>,
    content: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET
             title = COALESCE(?1, title),
             content = COALESCE(?2, content),
             updated_at = ?3
         WHERE id = ?4",
        params![title, content, now, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Report", id));
    }
    Ok(())
}

pub fn report_statistics(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<ReportStatistics, DatabaseError> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
    let cutoff = now - chrono::Duration::days(30);
    let recent: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reports WHERE created_at >= ?1",
        params![cutoff],
        |row| row.get(0),
    )?;
    let patients: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT patient_id) FROM reports",
        [],
        |row| row.get(0),
    )?;
    Ok(ReportStatistics {
        total_reports: total,
        reports_last_30_days: recent,
        patients_with_reports: patients,
    })
}
