//! Prescribing and dispensing.

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
    AuthUser, DispenseRecord, DoseFrequency, Drug, MedicationRoute, Prescription,
    PrescriptionStatus, Role,
};

// ── Drug catalogue ──────────────────────────────────────────

#[derive(Serialize)]
pub struct DrugsResponse {
    pub drugs: Vec<Drug>,
}

/// `GET /api/prescriptions/drugs`
pub async fn list_drugs(
    State(ctx): State<ApiContext>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<Json<DrugsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let drugs = repository::list_drugs(&conn)?;
    Ok(Json(DrugsResponse { drugs }))
}

#[derive(Deserialize)]
pub struct NewDrugRequest {
    pub name: String,
    pub generic_name: Option<String>,
    pub strength: String,
    pub form: String,
}

/// `POST /api/prescriptions/drugs` — prescribers and pharmacists
/// maintain the catalogue.
pub async fn create_drug(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewDrugRequest>,
) -> Result<Json<Drug>, ApiError> {
    if !(auth.role.can_prescribe()
        || auth.role == Role::Pharmacist
        || auth.role.can_manage_roles())
    {
        return Err(ApiError::Forbidden(
            "only prescribers and pharmacists may maintain the drug list".into(),
        ));
    }
    authorization::check_verified(&auth)?;

    let conn = ctx.conn()?;
    let drug = Drug {
        id: Uuid::new_v4(),
        name: req.name,
        generic_name: req.generic_name,
        strength: req.strength,
        form: req.form,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_drug(&conn, &drug)?;
    Ok(Json(drug))
}

// ── Prescriptions ───────────────────────────────────────────

#[derive(Serialize)]
pub struct PrescriptionsResponse {
    pub prescriptions: Vec<Prescription>,
}

/// `GET /api/prescriptions` — admins see all, pharmacists see the
/// dispensable queue, doctors what they prescribed, patients their own.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let prescriptions = if auth.role == Role::Pharmacist {
        repository::list_dispensable_prescriptions(&conn)?
    } else {
        match authorization::read_scope(Resource::Prescriptions, &auth) {
            ReadScope::All => repository::list_all_prescriptions(&conn)?,
            ReadScope::AsProvider(id) => {
                repository::list_prescriptions_for_prescriber(&conn, &id)?
            }
            ReadScope::OwnPatient(id) => repository::list_prescriptions_for_patient(&conn, &id)?,
            ReadScope::Nothing => Vec::new(),
        }
    };
    Ok(Json(PrescriptionsResponse { prescriptions }))
}

#[derive(Deserialize)]
pub struct NewPrescriptionRequest {
    pub patient_id: Uuid,
    pub drug_id: Option<Uuid>,
    pub medication_name: Option<String>,
    pub dosage: String,
    pub frequency: DoseFrequency,
    pub route: Option<MedicationRoute>,
    pub quantity: i64,
    #[serde(default)]
    pub refills: i64,
    #[serde(default)]
    pub instructions: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_controlled: bool,
}

/// `POST /api/prescriptions` — prescriber capability required.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewPrescriptionRequest>,
) -> Result<Json<Prescription>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::Prescriptions, &auth)?;

    repository::get_patient(&conn, &req.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    // Name comes from the catalogue entry unless given free-text.
    let medication_name = match (&req.drug_id, req.medication_name) {
        (Some(drug_id), name) => {
            let drug = repository::get_drug(&conn, drug_id)?
                .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;
            name.unwrap_or(drug.name)
        }
        (None, Some(name)) if !name.trim().is_empty() => name,
        (None, _) => {
            return Err(ApiError::BadRequest(
                "either drug_id or medication_name is required".into(),
            ))
        }
    };

    if req.quantity <= 0 {
        return Err(ApiError::BadRequest("quantity must be positive".into()));
    }

    let now = Utc::now().naive_utc();
    let rx = Prescription {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        prescribed_by: auth.id,
        drug_id: req.drug_id,
        medication_name,
        dosage: req.dosage,
        frequency: req.frequency,
        route: req.route.unwrap_or(MedicationRoute::Oral),
        quantity: req.quantity,
        refills: req.refills,
        instructions: req.instructions,
        start_date: req.start_date,
        end_date: req.end_date,
        dispensed_date: None,
        status: PrescriptionStatus::Active,
        is_controlled: req.is_controlled,
        created_at: now,
        updated_at: now,
    };
    repository::insert_prescription(&conn, &rx)?;
    Ok(Json(rx))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Prescription>, ApiError> {
    let conn = ctx.conn()?;
    let rx = fetch(&conn, &id)?;
    authorization::check_object(Resource::Prescriptions, &auth, &rx.patient_id)?;
    Ok(Json(rx))
}

// ── Dispensing ──────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct DispenseRequest {
    /// Partial quantity; omitted means the full remaining quantity.
    pub quantity: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
pub struct DispenseResponse {
    pub prescription: Prescription,
    pub record: DispenseRecord,
}

/// `POST /api/prescriptions/:id/dispense` — pharmacist only. A partial
/// quantity leaves the prescription open for the remainder.
pub async fn dispense(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<DispenseRequest>,
) -> Result<Json<DispenseResponse>, ApiError> {
    if auth.role != Role::Pharmacist {
        return Err(ApiError::Forbidden(
            "only pharmacists can dispense medications".into(),
        ));
    }
    authorization::check_verified(&auth)?;

    let conn = ctx.conn()?;
    let rx = fetch(&conn, &id)?;
    if !matches!(
        rx.status,
        PrescriptionStatus::Active | PrescriptionStatus::Partial
    ) {
        return Err(ApiError::InvalidState(format!(
            "cannot dispense a {} prescription",
            rx.status.as_str()
        )));
    }

    let quantity = req.quantity.unwrap_or(rx.quantity);
    if quantity <= 0 || quantity > rx.quantity {
        return Err(ApiError::BadRequest(
            "dispense quantity must be between 1 and the prescribed quantity".into(),
        ));
    }
    let new_status = if quantity < rx.quantity {
        PrescriptionStatus::Partial
    } else {
        PrescriptionStatus::Dispensed
    };

    let now = Utc::now().naive_utc();
    let record = DispenseRecord {
        id: Uuid::new_v4(),
        prescription_id: rx.id,
        dispensed_by: auth.id,
        quantity,
        notes: req.notes,
        dispensed_at: now,
    };

    let tx = conn.unchecked_transaction().map_err(|e| {
        ApiError::from(crate::db::DatabaseError::from(e))
    })?;
    repository::set_prescription_dispensed(&tx, &id, new_status, now)?;
    repository::insert_dispense_record(&tx, &record)?;
    tx.commit()
        .map_err(|e| ApiError::from(crate::db::DatabaseError::from(e)))?;

    Ok(Json(DispenseResponse {
        prescription: fetch(&conn, &id)?,
        record,
    }))
}

/// `GET /api/prescriptions/:id/dispenses`
pub async fn list_dispenses(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DispenseRecord>>, ApiError> {
    let conn = ctx.conn()?;
    let rx = fetch(&conn, &id)?;
    authorization::check_object(Resource::Prescriptions, &auth, &rx.patient_id)?;
    Ok(Json(repository::list_dispense_records(&conn, &id)?))
}

fn fetch(conn: &rusqlite::Connection, id: &Uuid) -> Result<Prescription, ApiError> {
    repository::get_prescription(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Prescription not found".into()))
}
