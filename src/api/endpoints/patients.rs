//! Patient profiles and the clinical records hanging off them.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::{self, ReadScope, Resource};
use crate::db::repository;
use crate::models::{
    Allergy, AllergySeverity, AuthUser, ClinicalNote, Gender, Patient, PatientMedication, Role,
};

#[derive(Serialize)]
pub struct PatientsResponse {
    pub patients: Vec<Patient>,
}

/// `GET /api/patients` — all profiles for care roles, own profile for
/// patients.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PatientsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let patients = match authorization::read_scope(Resource::Patients, &auth) {
        ReadScope::All => repository::list_patients(&conn)?,
        ReadScope::OwnPatient(id) => repository::get_patient(&conn, &id)?.into_iter().collect(),
        _ => Vec::new(),
    };
    Ok(Json(PatientsResponse { patients }))
}

#[derive(Deserialize)]
pub struct CreatePatientRequest {
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

/// `POST /api/patients` — staff create a profile for an existing
/// patient-role account (self-registration creates one automatically).
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Patients, &auth)?;

    let user = repository::get_user(&conn, &req.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    if user.role != Role::Patient {
        return Err(ApiError::BadRequest(
            "profiles can only be created for patient-role users".into(),
        ));
    }

    let now = Utc::now().naive_utc();
    let patient = Patient {
        id: Uuid::new_v4(),
        user_id: req.user_id,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        phone: req.phone,
        address: req.address,
        emergency_contact: req.emergency_contact,
        created_at: now,
        updated_at: now,
    };
    repository::insert_patient(&conn, &patient).map_err(|err| match err {
        crate::db::DatabaseError::ConstraintViolation(_) => {
            ApiError::Conflict("this user already has a patient profile".into())
        }
        other => other.into(),
    })?;
    Ok(Json(patient))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.conn()?;
    let patient = fetch_patient(&conn, &id)?;
    authorization::check_object(Resource::Patients, &auth, &patient.id)?;
    Ok(Json(patient))
}

#[derive(Deserialize, Default)]
pub struct UpdatePatientRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// `PATCH /api/patients/:id` — patients update their own demographics;
/// care roles update any profile.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.conn()?;
    let patient = fetch_patient(&conn, &id)?;

    if auth.role == Role::Patient {
        if auth.patient_id != Some(patient.id) {
            return Err(ApiError::Forbidden(
                "patients may only update their own profile".into(),
            ));
        }
    } else {
        authorization::check_write(Resource::Patients, &auth)?;
    }

    repository::update_patient(
        &conn,
        &id,
        &repository::PatientUpdate {
            phone: req.phone,
            address: req.address,
            emergency_contact: req.emergency_contact,
            date_of_birth: req.date_of_birth,
        },
        Utc::now().naive_utc(),
    )?;
    Ok(Json(fetch_patient(&conn, &id)?))
}

// ── Clinical notes ──────────────────────────────────────────

#[derive(Serialize)]
pub struct NotesResponse {
    pub notes: Vec<ClinicalNote>,
}

/// `GET /api/patients/:id/notes`
pub async fn list_notes(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotesResponse>, ApiError> {
    let conn = ctx.conn()?;
    let patient = fetch_patient(&conn, &id)?;
    authorization::check_object(Resource::ClinicalNotes, &auth, &patient.id)?;
    let notes = repository::list_clinical_notes(&conn, &patient.id)?;
    Ok(Json(NotesResponse { notes }))
}

#[derive(Deserialize)]
pub struct NewNoteRequest {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

/// `POST /api/patients/:id/notes` — SOAP note authored by the caller.
pub async fn create_note(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewNoteRequest>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::ClinicalNotes, &auth)?;
    let patient = fetch_patient(&conn, &id)?;

    let now = Utc::now().naive_utc();
    let note = ClinicalNote {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        provider_id: auth.id,
        subjective: req.subjective,
        objective: req.objective,
        assessment: req.assessment,
        plan: req.plan,
        created_at: now,
        updated_at: now,
    };
    repository::insert_clinical_note(&conn, &note)?;
    Ok(Json(note))
}

// ── Allergies ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct AllergiesResponse {
    pub allergies: Vec<Allergy>,
}

/// `GET /api/patients/:id/allergies`
pub async fn list_allergies(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<AllergiesResponse>, ApiError> {
    let conn = ctx.conn()?;
    let patient = fetch_patient(&conn, &id)?;
    authorization::check_object(Resource::Allergies, &auth, &patient.id)?;
    let allergies = repository::list_allergies(&conn, &patient.id)?;
    Ok(Json(AllergiesResponse { allergies }))
}

#[derive(Deserialize)]
pub struct NewAllergyRequest {
    pub allergen: String,
    pub reaction: String,
    pub severity: AllergySeverity,
}

/// `POST /api/patients/:id/allergies`
pub async fn create_allergy(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewAllergyRequest>,
) -> Result<Json<Allergy>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Allergies, &auth)?;
    let patient = fetch_patient(&conn, &id)?;

    let allergy = Allergy {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        allergen: req.allergen,
        reaction: req.reaction,
        severity: req.severity,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_allergy(&conn, &allergy)?;
    Ok(Json(allergy))
}

// ── Medications ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct MedicationsResponse {
    pub medications: Vec<PatientMedication>,
}

/// `GET /api/patients/:id/medications`
pub async fn list_medications(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicationsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let patient = fetch_patient(&conn, &id)?;
    authorization::check_object(Resource::Medications, &auth, &patient.id)?;
    let medications = repository::list_patient_medications(&conn, &patient.id)?;
    Ok(Json(MedicationsResponse { medications }))
}

#[derive(Deserialize)]
pub struct NewMedicationRequest {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub prescribed_date: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// `POST /api/patients/:id/medications`
pub async fn create_medication(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewMedicationRequest>,
) -> Result<Json<PatientMedication>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Medications, &auth)?;
    let patient = fetch_patient(&conn, &id)?;

    let med = PatientMedication {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        name: req.name,
        dosage: req.dosage,
        frequency: req.frequency,
        prescribed_date: req.prescribed_date,
        active: req.active,
    };
    repository::insert_patient_medication(&conn, &med)?;
    Ok(Json(med))
}

fn fetch_patient(conn: &rusqlite::Connection, id: &Uuid) -> Result<Patient, ApiError> {
    repository::get_patient(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))
}
