//! API endpoint handlers, one module per resource family.

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod health;
pub mod labs;
pub mod patients;
pub mod prescriptions;
pub mod reports;
