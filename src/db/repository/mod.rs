//! Repository layer — entity-scoped database operations.
//!
//! All functions take a borrowed `Connection` (or a `Transaction`, which
//! derefs to one) and return `DatabaseError`. Ids are stored as TEXT
//! uuids; enums as their string form.

mod appointment;
mod lab;
mod patient;
mod prescription;
mod report;
mod user;

pub use appointment::*;
pub use lab::*;
pub use patient::*;
pub use prescription::*;
pub use report::*;
pub use user::*;

use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;
use uuid::Uuid;

use super::DatabaseError;

/// Read a TEXT uuid column.
pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT uuid column.
pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column holding one of the string enums.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let s: String = row.get(idx)?;
    T::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
