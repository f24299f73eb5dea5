//! Service-level error taxonomy shared by accounts, authorization and
//! scheduling. The API layer maps each variant onto an HTTP status.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Role or ownership check failed.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Transition attempted from an invalid source state.
    #[error("invalid state: {0}")]
    State(String),

    /// Referenced entity absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness or lifecycle conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure not caused by the request.
    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => ServiceError::NotFound(entity_type),
            DatabaseError::ConstraintViolation(msg) => ServiceError::Conflict(msg),
            DatabaseError::InvalidEnum { field, value } => {
                ServiceError::Validation(format!("invalid {field}: {value}"))
            }
            other => ServiceError::Database(other),
        }
    }
}
