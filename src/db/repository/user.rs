use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::{AuthUser, Role, RoleCount, User, UserStats};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role, work_id,
     license_number, specialization, phone, is_verified, is_active,
     verified_by, verified_at, deactivated_by, deactivated_at, role_updated_by, created_at";

/// Insert payload for a new account. The hash is write-only: `User` reads
/// never include it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub work_id: Option<String>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub created_at: NaiveDateTime,
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: enum_col(row, 5)?,
        work_id: row.get(6)?,
        license_number: row.get(7)?,
        specialization: row.get(8)?,
        phone: row.get(9)?,
        is_verified: row.get(10)?,
        is_active: row.get(11)?,
        verified_by: opt_uuid_col(row, 12)?,
        verified_at: row.get(13)?,
        deactivated_by: opt_uuid_col(row, 14)?,
        deactivated_at: row.get(15)?,
        role_updated_by: opt_uuid_col(row, 16)?,
        created_at: row.get(17)?,
    })
}

/// Insert a new user. A duplicate username or work_id surfaces as
/// `ConstraintViolation` — the unique index is the source of truth.
pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, password_hash, email, first_name, last_name, role,
         work_id, license_number, specialization, phone, is_verified, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13)",
        params![
            user.id.to_string(),
            user.username,
            user.password_hash,
            user.email,
            user.first_name,
            user.last_name,
            user.role.as_str(),
            user.work_id,
            user.license_number,
            user.specialization,
            user.phone,
            user.is_verified,
            user.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        user_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        user_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Credential lookup for login: (user id, stored hash, is_active).
pub fn get_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(Uuid, String, bool)>, DatabaseError> {
    conn.query_row(
        "SELECT id, password_hash, is_active FROM users WHERE username = ?1",
        params![username],
        |row| Ok((uuid_col(row, 0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn set_verified(
    conn: &Connection,
    user_id: &Uuid,
    verified_by: &Uuid,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_verified = 1, verified_by = ?1, verified_at = ?2 WHERE id = ?3",
        params![verified_by.to_string(), at, user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

/// Update role and the role audit field. `force_verified` additionally
/// marks the account verified (master_admin is always verified).
pub fn set_role(
    conn: &Connection,
    user_id: &Uuid,
    role: Role,
    updated_by: &Uuid,
    force_verified: bool,
) -> Result<(), DatabaseError> {
    let changed = if force_verified {
        conn.execute(
            "UPDATE users SET role = ?1, role_updated_by = ?2, is_verified = 1 WHERE id = ?3",
            params![role.as_str(), updated_by.to_string(), user_id.to_string()],
        )?
    } else {
        conn.execute(
            "UPDATE users SET role = ?1, role_updated_by = ?2 WHERE id = ?3",
            params![role.as_str(), updated_by.to_string(), user_id.to_string()],
        )?
    };
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

pub fn set_deactivated(
    conn: &Connection,
    user_id: &Uuid,
    by: &Uuid,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = 0, deactivated_by = ?1, deactivated_at = ?2 WHERE id = ?3",
        params![by.to_string(), at, user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

pub fn set_reactivated(conn: &Connection, user_id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = 1, deactivated_by = NULL, deactivated_at = NULL
         WHERE id = ?1",
        params![user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

/// Self-service contact update; absent fields keep their value.
pub fn update_user_contact(
    conn: &Connection,
    user_id: &Uuid,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET
             email = COALESCE(?1, email),
             first_name = COALESCE(?2, first_name),
             last_name = COALESCE(?3, last_name),
             phone = COALESCE(?4, phone)
         WHERE id = ?5",
        params![email, first_name, last_name, phone, user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

pub fn count_master_admins(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'master_admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn user_stats(conn: &Connection) -> Result<UserStats, DatabaseError> {
    let (total, verified, active): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(is_verified), 0),
                COALESCE(SUM(is_active), 0)
         FROM users",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let staff_roles: Vec<String> = Role::REGISTRABLE_STAFF
        .iter()
        .map(|r| format!("'{}'", r.as_str()))
        .collect();
    let pending: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM users WHERE is_verified = 0 AND role IN ({})",
            staff_roles.join(", ")
        ),
        [],
        |row| row.get(0),
    )?;

    let mut by_role = Vec::with_capacity(Role::ALL.len());
    for role in Role::ALL {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        by_role.push(RoleCount { role: *role, count });
    }

    Ok(UserStats {
        total_users: total,
        verified_users: verified,
        pending_verification: pending,
        active_users: active,
        deactivated_users: total - active,
        by_role,
    })
}

/// Resolve the authenticated identity for a user id, including the
/// linked patient profile id when one exists.
pub fn auth_user(conn: &Connection, user_id: &Uuid) -> Result<Option<AuthUser>, DatabaseError> {
    conn.query_row(
        "SELECT u.id, u.username, u.role, u.is_verified, p.id
         FROM users u LEFT JOIN patients p ON p.user_id = u.id
         WHERE u.id = ?1",
        params![user_id.to_string()],
        |row| {
            Ok(AuthUser {
                id: uuid_col(row, 0)?,
                username: row.get(1)?,
                role: enum_col(row, 2)?,
                is_verified: row.get(3)?,
                patient_id: opt_uuid_col(row, 4)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

// ── Sessions ────────────────────────────────────────────────

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: &Uuid,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, last_used_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![token_hash, user_id.to_string(), now],
    )?;
    Ok(())
}

/// Resolve a session token hash to its identity. Returns the identity
/// plus the account's `is_active` flag so the caller can distinguish a
/// dead token from a deactivated account.
pub fn session_user(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<(AuthUser, bool)>, DatabaseError> {
    conn.query_row(
        "SELECT u.id, u.username, u.role, u.is_verified, p.id, u.is_active
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         LEFT JOIN patients p ON p.user_id = u.id
         WHERE s.token_hash = ?1",
        params![token_hash],
        |row| {
            Ok((
                AuthUser {
                    id: uuid_col(row, 0)?,
                    username: row.get(1)?,
                    role: enum_col(row, 2)?,
                    is_verified: row.get(3)?,
                    patient_id: opt_uuid_col(row, 4)?,
                },
                row.get::<_, bool>(5)?,
            ))
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn touch_session(
    conn: &Connection,
    token_hash: &str,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE sessions SET last_used_at = ?1 WHERE token_hash = ?2",
        params![now, token_hash],
    )?;
    Ok(())
}

/// Drop every session for a user. Called on deactivation so a revoked
/// account cannot keep using an existing token.
pub fn delete_sessions_for_user(conn: &Connection, user_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn sample_user(username: &str, role: Role, work_id: Option<&str>) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            email: format!("{username}@example.org"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
            work_id: work_id.map(String::from),
            license_number: None,
            specialization: None,
            phone: None,
            is_verified: role == Role::Patient,
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn insert_and_fetch_round_trip() {
        let conn = open_memory_database().unwrap();
        let new = sample_user("drjones", Role::Doctor, Some("W100"));
        insert_user(&conn, &new).unwrap();

        let user = get_user(&conn, &new.id).unwrap().unwrap();
        assert_eq!(user.username, "drjones");
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.work_id.as_deref(), Some("W100"));
        assert!(!user.is_verified);
        assert!(user.is_active);
        assert!(user.verified_by.is_none());
    }

    #[test]
    fn duplicate_work_id_rejected_by_constraint() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &sample_user("a", Role::Doctor, Some("W1"))).unwrap();
        let err = insert_user(&conn, &sample_user("b", Role::Nurse, Some("W1"))).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn verify_updates_audit_fields() {
        let conn = open_memory_database().unwrap();
        let staff = sample_user("nurse1", Role::Nurse, Some("W2"));
        let admin = sample_user("admin1", Role::Admin, None);
        insert_user(&conn, &staff).unwrap();
        insert_user(&conn, &admin).unwrap();

        let at = staff.created_at;
        set_verified(&conn, &staff.id, &admin.id, at).unwrap();

        let user = get_user(&conn, &staff.id).unwrap().unwrap();
        assert!(user.is_verified);
        assert_eq!(user.verified_by, Some(admin.id));
        assert_eq!(user.verified_at, Some(at));
    }

    #[test]
    fn session_round_trip_includes_patient_link() {
        let conn = open_memory_database().unwrap();
        let patient = sample_user("pat1", Role::Patient, None);
        insert_user(&conn, &patient).unwrap();
        conn.execute(
            "INSERT INTO patients (id, user_id, date_of_birth, gender, created_at, updated_at)
             VALUES (?1, ?2, '1990-05-01', 'F', '2026-01-01T00:00:00', '2026-01-01T00:00:00')",
            params![Uuid::new_v4().to_string(), patient.id.to_string()],
        )
        .unwrap();

        insert_session(&conn, "tok-hash", &patient.id, patient.created_at).unwrap();
        let (auth, active) = session_user(&conn, "tok-hash").unwrap().unwrap();
        assert!(active);
        assert_eq!(auth.id, patient.id);
        assert_eq!(auth.role, Role::Patient);
        assert!(auth.patient_id.is_some());

        assert!(session_user(&conn, "unknown").unwrap().is_none());
    }

    #[test]
    fn deactivation_reflects_in_session_lookup() {
        let conn = open_memory_database().unwrap();
        let user = sample_user("doc2", Role::Doctor, Some("W3"));
        let admin = sample_user("admin2", Role::Admin, None);
        insert_user(&conn, &user).unwrap();
        insert_user(&conn, &admin).unwrap();
        insert_session(&conn, "h1", &user.id, user.created_at).unwrap();

        set_deactivated(&conn, &user.id, &admin.id, user.created_at).unwrap();
        let (_, active) = session_user(&conn, "h1").unwrap().unwrap();
        assert!(!active);

        delete_sessions_for_user(&conn, &user.id).unwrap();
        assert!(session_user(&conn, "h1").unwrap().is_none());
    }

    #[test]
    fn stats_count_by_role_and_flags() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &sample_user("p1", Role::Patient, None)).unwrap();
        insert_user(&conn, &sample_user("d1", Role::Doctor, Some("W10"))).unwrap();
        insert_user(&conn, &sample_user("l1", Role::LabScientist, Some("W11"))).unwrap();

        let stats = user_stats(&conn).unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.verified_users, 1); // only the patient
        assert_eq!(stats.pending_verification, 2);
        assert_eq!(stats.active_users, 3);
        assert_eq!(stats.deactivated_users, 0);
        let doctor_count = stats
            .by_role
            .iter()
            .find(|rc| rc.role == Role::Doctor)
            .unwrap()
            .count;
        assert_eq!(doctor_count, 1);
    }
}
