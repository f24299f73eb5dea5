//! Identity and role service: registration, login, verification and
//! role lifecycle.
//!
//! Patients self-register and are active immediately; staff register
//! into a pending state and must be verified by an administrator.
//! Accounts are never deleted — deactivation is the terminal negative
//! state and is reversible.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::db::repository;
use crate::error::ServiceError;
use crate::models::{AuthUser, Gender, Patient, Role, User, UserStats};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// PBKDF2-SHA256 round count for stored credential hashes.
const PBKDF2_ROUNDS: u32 = 100_000;

const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

// ─── Registration payloads ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PatientRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaffRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub work_id: Option<String>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
}

/// Successful login: the account plus a fresh bearer token.
#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
}

// ─── Token helpers ────────────────────────────────────────────────────────────

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a bearer token for storage; only the hash touches the database.
pub fn hash_token(token: &str) -> String {
    use base64::Engine;
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

// ─── Password hashing ─────────────────────────────────────────────────────────
// PBKDF2-SHA256 with a random per-user salt, stored as "salt$hash"
// (both base64).

fn hash_password(password: &str) -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut derived = [0u8; HASH_LENGTH];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut derived);

    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    format!("{}${}", b64.encode(salt), b64.encode(derived))
}

fn verify_password(password: &str, stored: &str) -> bool {
    use base64::Engine;
    use subtle::ConstantTimeEq;

    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    let Ok(salt) = b64.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = b64.decode(hash_b64) else {
        return false;
    };
    if expected.len() != HASH_LENGTH {
        return false;
    }

    let mut derived = [0u8; HASH_LENGTH];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut derived);
    derived.ct_eq(&expected).into()
}

// ─── Registration ─────────────────────────────────────────────────────────────

/// Self-service patient registration. Auto-verified, active immediately;
/// also creates the 1:1 patient profile row.
pub fn register_patient(
    conn: &Connection,
    reg: PatientRegistration,
) -> Result<User, ServiceError> {
    check_password(&reg.password, &reg.password_confirm)?;
    let password_hash = hash_password(&reg.password);
    let now = Utc::now().naive_utc();

    let new_user = repository::NewUser {
        id: Uuid::new_v4(),
        username: reg.username,
        password_hash,
        email: reg.email,
        first_name: reg.first_name,
        last_name: reg.last_name,
        role: Role::Patient,
        work_id: None,
        license_number: None,
        specialization: None,
        phone: reg.phone.clone(),
        is_verified: true,
        created_at: now,
    };

    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::insert_user(&tx, &new_user).map_err(conflict_on_unique)?;
    repository::insert_patient(
        &tx,
        &Patient {
            id: Uuid::new_v4(),
            user_id: new_user.id,
            date_of_birth: reg.date_of_birth,
            gender: reg.gender,
            phone: reg.phone,
            address: reg.address,
            emergency_contact: reg.emergency_contact,
            created_at: now,
            updated_at: now,
        },
    )?;
    tx.commit().map_err(db_err)?;

    tracing::info!(username = %new_user.username, "patient registered");
    fetch_user(conn, &new_user.id)
}

/// Staff registration: pending verification until an administrator
/// approves. The `work_id` unique index, not a pre-check, rejects
/// duplicates — closing the check-then-insert race.
pub fn register_staff(conn: &Connection, reg: StaffRegistration) -> Result<User, ServiceError> {
    if !Role::REGISTRABLE_STAFF.contains(&reg.role) {
        return Err(ServiceError::Validation(format!(
            "role {} is not a registrable staff role",
            reg.role.as_str()
        )));
    }
    let work_id = match reg.work_id.as_deref().map(str::trim) {
        Some(w) if !w.is_empty() => w.to_string(),
        _ => {
            return Err(ServiceError::Validation(
                "work_id is required for staff accounts".into(),
            ))
        }
    };
    check_password(&reg.password, &reg.password_confirm)?;
    let password_hash = hash_password(&reg.password);

    let new_user = repository::NewUser {
        id: Uuid::new_v4(),
        username: reg.username,
        password_hash,
        email: reg.email,
        first_name: reg.first_name,
        last_name: reg.last_name,
        role: reg.role,
        work_id: Some(work_id),
        license_number: reg.license_number,
        specialization: reg.specialization,
        phone: reg.phone,
        is_verified: false,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_user(conn, &new_user).map_err(conflict_on_unique)?;

    tracing::info!(username = %new_user.username, role = new_user.role.as_str(),
        "staff registered, pending verification");
    fetch_user(conn, &new_user.id)
}

fn check_password(password: &str, confirm: &str) -> Result<(), ServiceError> {
    if password != confirm {
        return Err(ServiceError::Validation(
            "password confirmation does not match".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::Validation(
            "password cannot be entirely numeric".into(),
        ));
    }
    Ok(())
}

// ─── Login ────────────────────────────────────────────────────────────────────

/// Verify credentials and mint a session token. Deactivated accounts
/// fail the same way as bad credentials.
pub fn login(conn: &Connection, username: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
    let invalid = || ServiceError::Validation("Invalid credentials".into());

    let (user_id, stored_hash, is_active) =
        repository::get_credentials(conn, username)?.ok_or_else(invalid)?;
    if !is_active {
        return Err(invalid());
    }
    if !verify_password(password, &stored_hash) {
        return Err(invalid());
    }

    let token = generate_token();
    repository::insert_session(conn, &hash_token(&token), &user_id, Utc::now().naive_utc())?;

    let user = fetch_user(conn, &user_id)?;
    tracing::info!(username, "login");
    Ok(LoginOutcome { user, token })
}

// ─── Administration ───────────────────────────────────────────────────────────

/// Mark a pending account verified.
pub fn verify_user(conn: &Connection, actor: &AuthUser, user_id: &Uuid) -> Result<User, ServiceError> {
    require(actor.role.can_verify_users(), "verify users")?;
    let user = fetch_user(conn, user_id)?;
    if user.is_verified {
        return Err(ServiceError::Conflict("User is already verified".into()));
    }
    repository::set_verified(conn, user_id, &actor.id, Utc::now().naive_utc())?;
    tracing::info!(target_user = %user.username, by = %actor.username, "user verified");
    fetch_user(conn, user_id)
}

/// Change a user's role. Any change touching `master_admin` — on either
/// side — requires the caller to hold that role themselves.
pub fn change_role(
    conn: &Connection,
    actor: &AuthUser,
    user_id: &Uuid,
    new_role: &str,
) -> Result<User, ServiceError> {
    require(actor.role.can_manage_roles(), "manage roles")?;
    let new_role = Role::from_str(new_role)
        .map_err(|_| ServiceError::Validation(format!("unknown role: {new_role}")))?;
    let user = fetch_user(conn, user_id)?;

    if (user.role.is_master_admin() || new_role.is_master_admin())
        && !actor.role.is_master_admin()
    {
        return Err(ServiceError::Authorization(
            "Only Master Admin can modify Master Admin roles".into(),
        ));
    }

    // master_admin accounts are verified by definition.
    repository::set_role(conn, user_id, new_role, &actor.id, new_role.is_master_admin())?;
    tracing::info!(target_user = %user.username, from = user.role.as_str(),
        to = new_role.as_str(), by = %actor.username, "role updated");
    fetch_user(conn, user_id)
}

/// Deactivate an account and revoke its sessions. Master admin accounts
/// cannot be deactivated, by anyone.
pub fn deactivate(conn: &Connection, actor: &AuthUser, user_id: &Uuid) -> Result<User, ServiceError> {
    require(actor.role.can_manage_roles(), "deactivate users")?;
    let user = fetch_user(conn, user_id)?;
    if user.role.is_master_admin() {
        return Err(ServiceError::Authorization(
            "Cannot deactivate Master Admin account".into(),
        ));
    }

    let tx = conn.unchecked_transaction().map_err(db_err)?;
    repository::set_deactivated(&tx, user_id, &actor.id, Utc::now().naive_utc())?;
    repository::delete_sessions_for_user(&tx, user_id)?;
    tx.commit().map_err(db_err)?;

    tracing::info!(target_user = %user.username, by = %actor.username, "user deactivated");
    fetch_user(conn, user_id)
}

pub fn reactivate(conn: &Connection, actor: &AuthUser, user_id: &Uuid) -> Result<User, ServiceError> {
    require(actor.role.can_manage_roles(), "reactivate users")?;
    repository::set_reactivated(conn, user_id)?;
    tracing::info!(target_user = %user_id.to_string(), by = %actor.username, "user reactivated");
    fetch_user(conn, user_id)
}

pub fn list_users(conn: &Connection, actor: &AuthUser) -> Result<Vec<User>, ServiceError> {
    require(actor.role.can_view_all_users(), "view all users")?;
    Ok(repository::list_users(conn)?)
}

pub fn get_user_admin(conn: &Connection, actor: &AuthUser, user_id: &Uuid) -> Result<User, ServiceError> {
    require(actor.role.can_view_all_users(), "view all users")?;
    fetch_user(conn, user_id)
}

pub fn user_stats(conn: &Connection, actor: &AuthUser) -> Result<UserStats, ServiceError> {
    require(actor.role.can_view_all_users(), "view user statistics")?;
    Ok(repository::user_stats(conn)?)
}

/// Contact fields an account may change about itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Update the caller's own contact details. Role, verification and
/// activation state are only reachable through the admin operations.
pub fn update_profile(
    conn: &Connection,
    actor: &AuthUser,
    update: &ProfileUpdate,
) -> Result<User, ServiceError> {
    repository::update_user_contact(
        conn,
        &actor.id,
        update.email.as_deref(),
        update.first_name.as_deref(),
        update.last_name.as_deref(),
        update.phone.as_deref(),
    )?;
    fetch_user(conn, &actor.id)
}

/// Create the initial master admin if none exists yet. Returns `None`
/// when one is already present.
pub fn bootstrap_master_admin(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<User>, ServiceError> {
    if repository::count_master_admins(conn)? > 0 {
        return Ok(None);
    }
    check_password(password, password)?;
    let new_user = repository::NewUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hash_password(password),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        role: Role::MasterAdmin,
        work_id: None,
        license_number: None,
        specialization: None,
        phone: None,
        is_verified: true,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_user(conn, &new_user).map_err(conflict_on_unique)?;
    tracing::info!(username, "master admin bootstrapped");
    fetch_user(conn, &new_user.id).map(Some)
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn require(allowed: bool, action: &str) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Authorization(format!(
            "caller may not {action}"
        )))
    }
}

fn fetch_user(conn: &Connection, id: &Uuid) -> Result<User, ServiceError> {
    repository::get_user(conn, id)?
        .ok_or_else(|| ServiceError::NotFound("User".into()))
}

fn db_err(err: rusqlite::Error) -> ServiceError {
    ServiceError::from(crate::db::DatabaseError::from(err))
}

/// Keep unique-index failures as conflicts with a stable message.
fn conflict_on_unique(err: crate::db::DatabaseError) -> ServiceError {
    match err {
        crate::db::DatabaseError::ConstraintViolation(msg) => {
            if msg.contains("work_id") {
                ServiceError::Conflict("A user with this work ID already exists".into())
            } else if msg.contains("username") {
                ServiceError::Conflict("Username already taken".into())
            } else {
                ServiceError::Conflict(msg)
            }
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    pub(crate) fn patient_reg(username: &str) -> PatientRegistration {
        PatientRegistration {
            username: username.to_string(),
            email: format!("{username}@example.org"),
            password: "correct-horse".into(),
            password_confirm: "correct-horse".into(),
            first_name: "Pat".into(),
            last_name: "Example".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            gender: Gender::Other,
            phone: None,
            address: None,
            emergency_contact: None,
        }
    }

    pub(crate) fn staff_reg(username: &str, role: Role, work_id: &str) -> StaffRegistration {
        StaffRegistration {
            username: username.to_string(),
            email: format!("{username}@example.org"),
            password: "correct-horse".into(),
            password_confirm: "correct-horse".into(),
            first_name: "Sam".into(),
            last_name: "Staff".into(),
            role,
            work_id: Some(work_id.to_string()),
            license_number: None,
            specialization: None,
            phone: None,
        }
    }

    pub(crate) fn as_auth(user: &User) -> AuthUser {
        AuthUser {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_verified: user.is_verified,
            patient_id: None,
        }
    }

    fn admin(conn: &Connection) -> AuthUser {
        let staff = register_staff(conn, staff_reg("adm", Role::Doctor, "ADM-1")).unwrap();
        let master = bootstrap_master_admin(conn, "root", "root-password").unwrap().unwrap();
        let user = change_role(conn, &as_auth(&master), &staff.id, "admin").unwrap();
        as_auth(&user)
    }

    #[test]
    fn patient_registration_is_auto_verified_with_profile() {
        let conn = open_memory_database().unwrap();
        let user = register_patient(&conn, patient_reg("pat1")).unwrap();
        assert_eq!(user.role, Role::Patient);
        assert!(user.is_verified);
        assert!(user.is_active);
        assert!(user.work_id.is_none());
        assert!(repository::get_patient_by_user(&conn, &user.id).unwrap().is_some());
    }

    #[test]
    fn password_mismatch_and_weakness_rejected() {
        let conn = open_memory_database().unwrap();

        let mut reg = patient_reg("p1");
        reg.password_confirm = "different-pass".into();
        assert!(matches!(
            register_patient(&conn, reg),
            Err(ServiceError::Validation(_))
        ));

        let mut reg = patient_reg("p2");
        reg.password = "short".into();
        reg.password_confirm = "short".into();
        assert!(matches!(
            register_patient(&conn, reg),
            Err(ServiceError::Validation(_))
        ));

        let mut reg = patient_reg("p3");
        reg.password = "1234567890".into();
        reg.password_confirm = "1234567890".into();
        assert!(matches!(
            register_patient(&conn, reg),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn staff_registration_pending_until_verified() {
        let conn = open_memory_database().unwrap();
        let staff = register_staff(&conn, staff_reg("doc1", Role::Doctor, "W100")).unwrap();
        assert!(!staff.is_verified);
        assert_eq!(staff.work_id.as_deref(), Some("W100"));

        let admin = admin(&conn);
        let verified = verify_user(&conn, &admin, &staff.id).unwrap();
        assert!(verified.is_verified);
        assert_eq!(verified.verified_by, Some(admin.id));
        assert!(verified.verified_at.is_some());
    }

    #[test]
    fn staff_registration_requires_staff_role_and_work_id() {
        let conn = open_memory_database().unwrap();

        let mut reg = staff_reg("x1", Role::Doctor, "W1");
        reg.work_id = None;
        assert!(matches!(
            register_staff(&conn, reg),
            Err(ServiceError::Validation(_))
        ));

        let reg = staff_reg("x2", Role::Admin, "W2");
        assert!(matches!(
            register_staff(&conn, reg),
            Err(ServiceError::Validation(_))
        ));

        let reg = staff_reg("x3", Role::Patient, "W3");
        assert!(matches!(
            register_staff(&conn, reg),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_work_id_is_conflict() {
        let conn = open_memory_database().unwrap();
        register_staff(&conn, staff_reg("a", Role::Doctor, "W100")).unwrap();
        let err = register_staff(&conn, staff_reg("b", Role::Nurse, "W100")).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn double_verification_is_conflict() {
        let conn = open_memory_database().unwrap();
        let staff = register_staff(&conn, staff_reg("doc2", Role::Doctor, "W7")).unwrap();
        let admin = admin(&conn);
        verify_user(&conn, &admin, &staff.id).unwrap();
        let err = verify_user(&conn, &admin, &staff.id).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn verification_requires_capability() {
        let conn = open_memory_database().unwrap();
        let staff = register_staff(&conn, staff_reg("doc3", Role::Doctor, "W8")).unwrap();
        let other = register_staff(&conn, staff_reg("nur1", Role::Nurse, "W9")).unwrap();
        let err = verify_user(&conn, &as_auth(&other), &staff.id).unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
    }

    #[test]
    fn only_master_admin_touches_master_admin_role() {
        let conn = open_memory_database().unwrap();
        let master = bootstrap_master_admin(&conn, "root", "root-password").unwrap().unwrap();
        let staff = register_staff(&conn, staff_reg("doc4", Role::Doctor, "W10")).unwrap();
        let admin_user = change_role(&conn, &as_auth(&master), &staff.id, "admin").unwrap();
        let admin = as_auth(&admin_user);

        // Admin cannot promote to master_admin
        let target = register_staff(&conn, staff_reg("doc5", Role::Doctor, "W11")).unwrap();
        let err = change_role(&conn, &admin, &target.id, "master_admin").unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));

        // Admin cannot demote a master_admin
        let err = change_role(&conn, &admin, &master.id, "doctor").unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));

        // Master admin can, and the new master admin is auto-verified
        let promoted = change_role(&conn, &as_auth(&master), &target.id, "master_admin").unwrap();
        assert_eq!(promoted.role, Role::MasterAdmin);
        assert!(promoted.is_verified);
        assert_eq!(promoted.role_updated_by, Some(master.id));
    }

    #[test]
    fn unknown_role_is_validation_error() {
        let conn = open_memory_database().unwrap();
        let master = bootstrap_master_admin(&conn, "root", "root-password").unwrap().unwrap();
        let staff = register_staff(&conn, staff_reg("doc6", Role::Doctor, "W12")).unwrap();
        let err = change_role(&conn, &as_auth(&master), &staff.id, "researcher").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn master_admin_can_never_be_deactivated() {
        let conn = open_memory_database().unwrap();
        let master = bootstrap_master_admin(&conn, "root", "root-password").unwrap().unwrap();
        let second = register_staff(&conn, staff_reg("doc7", Role::Doctor, "W13")).unwrap();
        let second = change_role(&conn, &as_auth(&master), &second.id, "master_admin").unwrap();

        // Not even another master admin may deactivate one.
        let err = deactivate(&conn, &as_auth(&second), &master.id).unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
        let err = deactivate(&conn, &as_auth(&master), &second.id).unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
    }

    #[test]
    fn deactivation_revokes_sessions_and_blocks_login() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let user = register_patient(&conn, patient_reg("pat2")).unwrap();
        let outcome = login(&conn, "pat2", "correct-horse").unwrap();
        assert!(repository::session_user(&conn, &hash_token(&outcome.token))
            .unwrap()
            .is_some());

        let deactivated = deactivate(&conn, &admin, &user.id).unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(deactivated.deactivated_by, Some(admin.id));
        assert!(repository::session_user(&conn, &hash_token(&outcome.token))
            .unwrap()
            .is_none());
        assert!(matches!(
            login(&conn, "pat2", "correct-horse"),
            Err(ServiceError::Validation(_))
        ));

        let reactivated = reactivate(&conn, &admin, &user.id).unwrap();
        assert!(reactivated.is_active);
        assert!(reactivated.deactivated_by.is_none());
        assert!(login(&conn, "pat2", "correct-horse").is_ok());
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let conn = open_memory_database().unwrap();
        register_patient(&conn, patient_reg("pat3")).unwrap();
        assert!(matches!(
            login(&conn, "pat3", "wrong-password"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            login(&conn, "nobody", "correct-horse"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn profile_update_patches_contact_fields_only() {
        let conn = open_memory_database().unwrap();
        let user = register_patient(&conn, patient_reg("pat9")).unwrap();
        let updated = update_profile(
            &conn,
            &as_auth(&user),
            &ProfileUpdate {
                phone: Some("555-0100".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.role, Role::Patient);
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("correct-horse");
        assert_ne!(hashed, hash_password("correct-horse"), "salt must vary");
        assert!(verify_password("correct-horse", &hashed));
        assert!(!verify_password("wrong-horse", &hashed));
        assert!(!verify_password("correct-horse", "not-a-stored-hash"));
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let first = bootstrap_master_admin(&conn, "root", "root-password").unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().is_verified);
        let second = bootstrap_master_admin(&conn, "root2", "root-password").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn user_listing_gated_by_capability() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let patient = register_patient(&conn, patient_reg("pat4")).unwrap();

        assert!(list_users(&conn, &admin).unwrap().len() >= 2);
        assert!(matches!(
            list_users(&conn, &as_auth(&patient)),
            Err(ServiceError::Authorization(_))
        ));
        assert!(matches!(
            user_stats(&conn, &as_auth(&patient)),
            Err(ServiceError::Authorization(_))
        ));
    }
}
