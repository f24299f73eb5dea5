use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// JSON representation matches the stored string form.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    MasterAdmin => "master_admin",
    Admin => "admin",
    Doctor => "doctor",
    Nurse => "nurse",
    Pharmacist => "pharmacist",
    Radiologist => "radiologist",
    LabScientist => "labscientist",
    Patient => "patient",
});

impl Role {
    pub const ALL: &'static [Role] = &[
        Role::MasterAdmin,
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Pharmacist,
        Role::Radiologist,
        Role::LabScientist,
        Role::Patient,
    ];

    /// Roles a staff registration may request. Admin roles are only
    /// reachable through a role change by an existing administrator.
    pub const REGISTRABLE_STAFF: &'static [Role] = &[
        Role::Doctor,
        Role::Nurse,
        Role::Pharmacist,
        Role::Radiologist,
        Role::LabScientist,
    ];

    pub fn is_medical_staff(self) -> bool {
        matches!(
            self,
            Role::Doctor | Role::Nurse | Role::Pharmacist | Role::Radiologist | Role::LabScientist
        )
    }

    pub fn can_prescribe(self) -> bool {
        matches!(self, Role::Doctor)
    }

    pub fn can_access_all_patient_data(self) -> bool {
        matches!(self, Role::Doctor | Role::Admin | Role::MasterAdmin)
    }

    pub fn can_upload_lab_results(self) -> bool {
        matches!(self, Role::LabScientist | Role::Doctor)
    }

    pub fn can_upload_radiology(self) -> bool {
        matches!(self, Role::Radiologist | Role::Doctor)
    }

    pub fn can_manage_roles(self) -> bool {
        matches!(self, Role::Admin | Role::MasterAdmin)
    }

    pub fn can_verify_users(self) -> bool {
        self.can_manage_roles()
    }

    pub fn can_view_all_users(self) -> bool {
        self.can_manage_roles()
    }

    pub fn is_master_admin(self) -> bool {
        matches!(self, Role::MasterAdmin)
    }
}

str_enum!(Gender {
    Male => "M",
    Female => "F",
    Other => "O",
});

str_enum!(AppointmentStatus {
    Requested => "requested",
    Proposed => "proposed",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
    NoShow => "no_show",
    Rescheduled => "rescheduled",
});

str_enum!(AppointmentType {
    Checkup => "checkup",
    Followup => "followup",
    Emergency => "emergency",
    Consultation => "consultation",
    Procedure => "procedure",
    Vaccination => "vaccination",
    LabTest => "lab_test",
    Imaging => "imaging",
});

str_enum!(AllergySeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(LabCategory {
    Blood => "blood",
    Urine => "urine",
    Imaging => "imaging",
    Pathology => "pathology",
    Microbiology => "microbiology",
    Genetic => "genetic",
});

str_enum!(LabPriority {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
});

str_enum!(LabOrderStatus {
    Ordered => "ordered",
    Collected => "collected",
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(PrescriptionStatus {
    Active => "active",
    Dispensed => "dispensed",
    Partial => "partial",
    Cancelled => "cancelled",
    Expired => "expired",
    Completed => "completed",
});

str_enum!(MedicationRoute {
    Oral => "oral",
    Intravenous => "iv",
    Intramuscular => "im",
    Subcutaneous => "sc",
    Topical => "topical",
    Inhalation => "inhalation",
    Sublingual => "sublingual",
    Rectal => "rectal",
});

str_enum!(DoseFrequency {
    Once => "once",
    Daily => "daily",
    TwiceDaily => "bid",
    ThreeTimesDaily => "tid",
    FourTimesDaily => "qid",
    Every4Hours => "q4h",
    Every6Hours => "q6h",
    Every8Hours => "q8h",
    Every12Hours => "q12h",
    AsNeeded => "prn",
    Weekly => "weekly",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trip() {
        for (variant, s) in [
            (Role::MasterAdmin, "master_admin"),
            (Role::Admin, "admin"),
            (Role::Doctor, "doctor"),
            (Role::Nurse, "nurse"),
            (Role::Pharmacist, "pharmacist"),
            (Role::Radiologist, "radiologist"),
            (Role::LabScientist, "labscientist"),
            (Role::Patient, "patient"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Role::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn role_serializes_to_stored_form() {
        let json = serde_json::to_string(&Role::LabScientist).unwrap();
        assert_eq!(json, "\"labscientist\"");
        let back: Role = serde_json::from_str("\"master_admin\"").unwrap();
        assert_eq!(back, Role::MasterAdmin);
    }

    #[test]
    fn manage_roles_is_admin_only() {
        for role in Role::ALL {
            assert_eq!(
                role.can_manage_roles(),
                matches!(role, Role::Admin | Role::MasterAdmin),
                "can_manage_roles mismatch for {role:?}"
            );
            assert_eq!(role.can_verify_users(), role.can_manage_roles());
            assert_eq!(role.can_view_all_users(), role.can_manage_roles());
        }
    }

    #[test]
    fn prescribing_is_doctor_only() {
        for role in Role::ALL {
            assert_eq!(role.can_prescribe(), matches!(role, Role::Doctor));
        }
    }

    #[test]
    fn all_patient_data_roles() {
        for role in Role::ALL {
            assert_eq!(
                role.can_access_all_patient_data(),
                matches!(role, Role::Doctor | Role::Admin | Role::MasterAdmin)
            );
        }
    }

    #[test]
    fn upload_capabilities() {
        for role in Role::ALL {
            assert_eq!(
                role.can_upload_lab_results(),
                matches!(role, Role::LabScientist | Role::Doctor)
            );
            assert_eq!(
                role.can_upload_radiology(),
                matches!(role, Role::Radiologist | Role::Doctor)
            );
        }
    }

    #[test]
    fn medical_staff_excludes_admins_and_patients() {
        for role in Role::ALL {
            assert_eq!(
                role.is_medical_staff(),
                matches!(
                    role,
                    Role::Doctor
                        | Role::Nurse
                        | Role::Pharmacist
                        | Role::Radiologist
                        | Role::LabScientist
                )
            );
        }
    }

    #[test]
    fn registrable_staff_excludes_admin_roles() {
        assert!(!Role::REGISTRABLE_STAFF.contains(&Role::Admin));
        assert!(!Role::REGISTRABLE_STAFF.contains(&Role::MasterAdmin));
        assert!(!Role::REGISTRABLE_STAFF.contains(&Role::Patient));
        for role in Role::REGISTRABLE_STAFF {
            assert!(role.is_medical_staff());
        }
    }

    #[test]
    fn appointment_status_round_trip() {
        for (variant, s) in [
            (AppointmentStatus::Requested, "requested"),
            (AppointmentStatus::Proposed, "proposed"),
            (AppointmentStatus::Confirmed, "confirmed"),
            (AppointmentStatus::Cancelled, "cancelled"),
            (AppointmentStatus::Completed, "completed"),
            (AppointmentStatus::NoShow, "no_show"),
            (AppointmentStatus::Rescheduled, "rescheduled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Role::from_str("researcher").is_err());
        assert!(AppointmentStatus::from_str("unknown").is_err());
        assert!(LabOrderStatus::from_str("").is_err());
    }
}
