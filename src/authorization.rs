//! Per-resource access policy.
//!
//! Every protected resource resolves through one declarative table
//! instead of re-implementing role branches per endpoint:
//! 1. Role in the read-all set → unrestricted read scope
//! 2. Provider-side role → rows where the user is the acting provider
//! 3. Patient with a profile → rows owned by that profile
//! 4. Default → no rows
//!
//! Writes are gated by the policy's write set; unverified medical staff
//! cannot write. Detail endpoints additionally re-check ownership via
//! [`check_object`] so a row fetched by id cannot bypass list scoping.

use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{AuthUser, Role};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Protected resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Patients,
    ClinicalNotes,
    Allergies,
    Medications,
    LabOrders,
    Prescriptions,
    Appointments,
    Reports,
}

/// Row visibility granted to a requester for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Role may read every row.
    All,
    /// Rows owned by this patient profile.
    OwnPatient(Uuid),
    /// Rows where this user is the acting provider (orderer,
    /// prescriber, appointment provider).
    AsProvider(Uuid),
    /// No rows.
    Nothing,
}

/// One row of the access table.
#[derive(Debug)]
pub struct Policy {
    /// Roles that read every row.
    pub read_all: &'static [Role],
    /// Roles whose reads are scoped to rows they act on as provider.
    pub provider_read: &'static [Role],
    /// Roles that may create/update rows.
    pub write: &'static [Role],
}

// ═══════════════════════════════════════════════════════════
// The table
// ═══════════════════════════════════════════════════════════

const ADMINS: &[Role] = &[Role::Admin, Role::MasterAdmin];
const CARE_TEAM: &[Role] = &[Role::Doctor, Role::Nurse, Role::Admin, Role::MasterAdmin];

pub fn policy(resource: Resource) -> &'static Policy {
    match resource {
        Resource::Patients => &Policy {
            read_all: &[
                Role::Doctor,
                Role::Nurse,
                Role::Pharmacist,
                Role::Radiologist,
                Role::LabScientist,
                Role::Admin,
                Role::MasterAdmin,
            ],
            provider_read: &[],
            write: CARE_TEAM,
        },
        Resource::ClinicalNotes => &Policy {
            read_all: CARE_TEAM,
            provider_read: &[],
            write: &[Role::Doctor, Role::Nurse],
        },
        Resource::Allergies => &Policy {
            read_all: CARE_TEAM,
            provider_read: &[],
            write: &[Role::Doctor, Role::Nurse],
        },
        Resource::Medications => &Policy {
            read_all: &[
                Role::Doctor,
                Role::Nurse,
                Role::Pharmacist,
                Role::Admin,
                Role::MasterAdmin,
            ],
            provider_read: &[],
            write: &[Role::Doctor, Role::Nurse],
        },
        Resource::LabOrders => &Policy {
            read_all: &[Role::LabScientist, Role::Admin, Role::MasterAdmin],
            provider_read: &[Role::Doctor],
            write: &[Role::Doctor],
        },
        Resource::Prescriptions => &Policy {
            read_all: &[Role::Pharmacist, Role::Admin, Role::MasterAdmin],
            provider_read: &[Role::Doctor],
            write: &[Role::Doctor],
        },
        Resource::Appointments => &Policy {
            read_all: ADMINS,
            provider_read: &[
                Role::Doctor,
                Role::Nurse,
                Role::Pharmacist,
                Role::Radiologist,
                Role::LabScientist,
            ],
            write: &[],
        },
        Resource::Reports => &Policy {
            read_all: CARE_TEAM,
            provider_read: &[],
            write: CARE_TEAM,
        },
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// Resolve the rows a requester may list for a resource.
pub fn read_scope(resource: Resource, user: &AuthUser) -> ReadScope {
    let policy = policy(resource);
    if policy.read_all.contains(&user.role) {
        return ReadScope::All;
    }
    if policy.provider_read.contains(&user.role) {
        return ReadScope::AsProvider(user.id);
    }
    if user.role == Role::Patient {
        if let Some(patient_id) = user.patient_id {
            return ReadScope::OwnPatient(patient_id);
        }
    }
    ReadScope::Nothing
}

/// Gate a create/update. Medical staff must be verified before writing
/// clinical data.
pub fn check_write(resource: Resource, user: &AuthUser) -> Result<(), ServiceError> {
    let policy = policy(resource);
    if !policy.write.contains(&user.role) {
        return Err(ServiceError::Authorization(format!(
            "role {} may not write this resource",
            user.role.as_str()
        )));
    }
    check_verified(user)
}

/// Unverified staff accounts hold no write capabilities yet.
pub fn check_verified(user: &AuthUser) -> Result<(), ServiceError> {
    if user.role.is_medical_staff() && !user.is_verified {
        return Err(ServiceError::Authorization(
            "account pending verification".into(),
        ));
    }
    Ok(())
}

/// Object-level re-check for detail endpoints: a patient requester must
/// own the row's linked patient profile regardless of how the row was
/// fetched. Non-patient requesters are covered by scope filtering.
pub fn check_object(
    resource: Resource,
    user: &AuthUser,
    owning_patient_id: &Uuid,
) -> Result<(), ServiceError> {
    match read_scope(resource, user) {
        ReadScope::All | ReadScope::AsProvider(_) => Ok(()),
        ReadScope::OwnPatient(own) if own == *owning_patient_id => Ok(()),
        _ => Err(ServiceError::Authorization(
            "not permitted to access this record".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(role: Role, patient_id: Option<Uuid>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: format!("{}-user", role.as_str()),
            role,
            is_verified: true,
            patient_id,
        }
    }

    #[test]
    fn doctors_read_all_patient_resources() {
        let doctor = auth(Role::Doctor, None);
        assert_eq!(read_scope(Resource::Patients, &doctor), ReadScope::All);
        assert_eq!(read_scope(Resource::ClinicalNotes, &doctor), ReadScope::All);
        assert_eq!(read_scope(Resource::Reports, &doctor), ReadScope::All);
    }

    #[test]
    fn doctor_lab_and_prescription_reads_are_provider_scoped() {
        let doctor = auth(Role::Doctor, None);
        assert_eq!(
            read_scope(Resource::LabOrders, &doctor),
            ReadScope::AsProvider(doctor.id)
        );
        assert_eq!(
            read_scope(Resource::Prescriptions, &doctor),
            ReadScope::AsProvider(doctor.id)
        );
    }

    #[test]
    fn patient_scope_is_own_profile() {
        let patient_id = Uuid::new_v4();
        let patient = auth(Role::Patient, Some(patient_id));
        for resource in [
            Resource::Patients,
            Resource::ClinicalNotes,
            Resource::LabOrders,
            Resource::Prescriptions,
            Resource::Appointments,
            Resource::Reports,
        ] {
            assert_eq!(
                read_scope(resource, &patient),
                ReadScope::OwnPatient(patient_id),
                "patient scope mismatch for {resource:?}"
            );
        }
    }

    #[test]
    fn patient_without_profile_sees_nothing() {
        let patient = auth(Role::Patient, None);
        assert_eq!(read_scope(Resource::Reports, &patient), ReadScope::Nothing);
    }

    #[test]
    fn radiologist_cannot_list_foreign_prescriptions() {
        let radiologist = auth(Role::Radiologist, None);
        assert_eq!(
            read_scope(Resource::Prescriptions, &radiologist),
            ReadScope::Nothing
        );
    }

    #[test]
    fn prescription_writes_require_prescriber() {
        for role in Role::ALL {
            let user = auth(*role, None);
            let allowed = check_write(Resource::Prescriptions, &user).is_ok();
            assert_eq!(allowed, role.can_prescribe(), "write mismatch for {role:?}");
        }
    }

    #[test]
    fn unverified_staff_cannot_write() {
        let mut nurse = auth(Role::Nurse, None);
        nurse.is_verified = false;
        let err = check_write(Resource::ClinicalNotes, &nurse).unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));

        nurse.is_verified = true;
        assert!(check_write(Resource::ClinicalNotes, &nurse).is_ok());
    }

    #[test]
    fn object_check_blocks_foreign_patient_rows() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let patient = auth(Role::Patient, Some(own));

        assert!(check_object(Resource::Reports, &patient, &own).is_ok());
        let err = check_object(Resource::Reports, &patient, &other).unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));

        // Roles with full scope pass the re-check.
        let admin = auth(Role::Admin, None);
        assert!(check_object(Resource::Reports, &admin, &other).is_ok());
    }

    #[test]
    fn appointments_readable_by_admins_and_participants_only() {
        let admin = auth(Role::Admin, None);
        assert_eq!(read_scope(Resource::Appointments, &admin), ReadScope::All);

        let doctor = auth(Role::Doctor, None);
        assert_eq!(
            read_scope(Resource::Appointments, &doctor),
            ReadScope::AsProvider(doctor.id)
        );
    }
}
