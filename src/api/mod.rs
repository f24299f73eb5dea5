//! REST API layer.
//!
//! Routes are nested under `/api/`. Registration and login are open;
//! everything else passes the bearer-token auth middleware, which
//! resolves the session to an [`crate::models::AuthUser`] before the
//! handler runs. Errors leave as structured JSON with a machine
//! readable code.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use types::ApiContext;
