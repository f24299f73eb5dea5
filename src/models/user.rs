use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// Account row. The credential hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub work_id: Option<String>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<NaiveDateTime>,
    pub deactivated_by: Option<Uuid>,
    pub deactivated_at: Option<NaiveDateTime>,
    pub role_updated_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Authenticated identity, resolved from a session token by the auth
/// middleware and consumed by the authorization layer and services.
/// `patient_id` is populated for patient-role users with a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_verified: bool,
    pub patient_id: Option<Uuid>,
}

/// Aggregate user counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: i64,
    pub verified_users: i64,
    pub pending_verification: i64,
    pub active_users: i64,
    pub deactivated_users: i64,
    pub by_role: Vec<RoleCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}
