//! Lab test catalogue, orders and results.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::{self, ReadScope, Resource};
use crate::db::repository;
use crate::models::{
    AuthUser, LabCategory, LabOrder, LabOrderStatus, LabPriority, LabResultEntry, LabTestType,
};

// ── Test types ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct TestTypesResponse {
    pub test_types: Vec<LabTestType>,
}

/// `GET /api/labs/test-types` — active catalogue, any authenticated
/// user.
pub async fn list_test_types(
    State(ctx): State<ApiContext>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<Json<TestTypesResponse>, ApiError> {
    let conn = ctx.conn()?;
    let test_types = repository::list_test_types(&conn)?;
    Ok(Json(TestTypesResponse { test_types }))
}

#[derive(Deserialize)]
pub struct NewTestTypeRequest {
    pub name: String,
    pub category: LabCategory,
    #[serde(default)]
    pub description: String,
    pub unit: Option<String>,
    pub reference_range_min: Option<f64>,
    pub reference_range_max: Option<f64>,
}

/// `POST /api/labs/test-types` — lab staff maintain the catalogue.
pub async fn create_test_type(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewTestTypeRequest>,
) -> Result<Json<LabTestType>, ApiError> {
    if !(auth.role.can_upload_lab_results() || auth.role.can_manage_roles()) {
        return Err(ApiError::Forbidden(
            "only lab staff may maintain the test catalogue".into(),
        ));
    }
    authorization::check_verified(&auth)?;

    let conn = ctx.conn()?;
    let tt = LabTestType {
        id: Uuid::new_v4(),
        name: req.name,
        category: req.category,
        description: req.description,
        unit: req.unit,
        reference_range_min: req.reference_range_min,
        reference_range_max: req.reference_range_max,
        is_active: true,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_test_type(&conn, &tt)?;
    Ok(Json(tt))
}

// ── Orders ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<LabOrder>,
}

/// `GET /api/labs/orders` — lab staff and admins see all, doctors see
/// orders they placed, patients their own.
pub async fn list_orders(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let conn = ctx.conn()?;
    let orders = match authorization::read_scope(Resource::LabOrders, &auth) {
        ReadScope::All => repository::list_all_lab_orders(&conn)?,
        ReadScope::AsProvider(id) => repository::list_lab_orders_for_orderer(&conn, &id)?,
        ReadScope::OwnPatient(id) => repository::list_lab_orders_for_patient(&conn, &id)?,
        ReadScope::Nothing => Vec::new(),
    };
    Ok(Json(OrdersResponse { orders }))
}

#[derive(Deserialize)]
pub struct NewOrderRequest {
    pub patient_id: Uuid,
    pub test_type_id: Uuid,
    #[serde(default)]
    pub clinical_notes: String,
    pub priority: Option<LabPriority>,
}

/// `POST /api/labs/orders` — ordering is a prescriber action.
pub async fn create_order(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewOrderRequest>,
) -> Result<Json<LabOrder>, ApiError> {
    let conn = ctx.conn()?;
    authorization::check_write(Resource::LabOrders, &auth)?;

    repository::get_patient(&conn, &req.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    let test_type = repository::get_test_type(&conn, &req.test_type_id)?
        .ok_or_else(|| ApiError::NotFound("Lab test type not found".into()))?;
    if !test_type.is_active {
        return Err(ApiError::BadRequest("test type is retired".into()));
    }

    let now = Utc::now().naive_utc();
    let order = LabOrder {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        ordered_by: auth.id,
        test_type_id: test_type.id,
        priority: req.priority.unwrap_or(LabPriority::Routine),
        status: LabOrderStatus::Ordered,
        clinical_notes: req.clinical_notes,
        collection_date: None,
        collection_site: None,
        collected_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_lab_order(&conn, &order)?;
    Ok(Json(order))
}

/// `GET /api/labs/orders/:id`
pub async fn order_detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<LabOrder>, ApiError> {
    let conn = ctx.conn()?;
    let order = fetch_order(&conn, &id)?;
    authorization::check_object(Resource::LabOrders, &auth, &order.patient_id)?;
    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: LabOrderStatus,
    pub collection_site: Option<String>,
}

/// `POST /api/labs/orders/:id/status` — advance the processing
/// pipeline. Transitions only move forward; cancellation is allowed
/// until results are in.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<LabOrder>, ApiError> {
    if !(auth.role.can_upload_lab_results() || auth.role.can_manage_roles()) {
        return Err(ApiError::Forbidden(
            "only lab staff may update order status".into(),
        ));
    }
    authorization::check_verified(&auth)?;

    let conn = ctx.conn()?;
    let order = fetch_order(&conn, &id)?;
    if !valid_next(order.status).contains(&req.status) {
        return Err(ApiError::InvalidState(format!(
            "cannot move lab order from {} to {}",
            order.status.as_str(),
            req.status.as_str()
        )));
    }

    let now = Utc::now().naive_utc();
    if req.status == LabOrderStatus::Collected {
        repository::set_lab_order_collected(
            &conn,
            &id,
            &auth.id,
            req.collection_site.as_deref(),
            now,
        )?;
    } else {
        repository::set_lab_order_status(&conn, &id, req.status, now)?;
    }
    Ok(Json(fetch_order(&conn, &id)?))
}

fn valid_next(from: LabOrderStatus) -> &'static [LabOrderStatus] {
    match from {
        LabOrderStatus::Ordered => &[LabOrderStatus::Collected, LabOrderStatus::Cancelled],
        LabOrderStatus::Collected => &[LabOrderStatus::Processing, LabOrderStatus::Cancelled],
        LabOrderStatus::Processing => &[LabOrderStatus::Completed, LabOrderStatus::Cancelled],
        LabOrderStatus::Completed | LabOrderStatus::Cancelled => &[],
    }
}

// ── Results ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ResultsResponse {
    pub results: Vec<LabResultEntry>,
}

/// `GET /api/labs/orders/:id/results`
pub async fn list_results(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let conn = ctx.conn()?;
    let order = fetch_order(&conn, &id)?;
    authorization::check_object(Resource::LabOrders, &auth, &order.patient_id)?;
    let results = repository::list_lab_results(&conn, &id)?;
    Ok(Json(ResultsResponse { results }))
}

#[derive(Deserialize)]
pub struct NewResultRequest {
    pub parameter: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default)]
    pub notes: String,
}

/// `POST /api/labs/orders/:id/results` — attach a measured parameter.
/// Only roles with the lab-results capability may record results.
pub async fn add_result(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewResultRequest>,
) -> Result<Json<LabResultEntry>, ApiError> {
    if !auth.role.can_upload_lab_results() {
        return Err(ApiError::Forbidden(
            "only lab scientists and doctors can add results".into(),
        ));
    }
    authorization::check_verified(&auth)?;

    let conn = ctx.conn()?;
    let order = fetch_order(&conn, &id)?;
    if matches!(
        order.status,
        LabOrderStatus::Completed | LabOrderStatus::Cancelled
    ) {
        return Err(ApiError::InvalidState(format!(
            "cannot add results to a {} order",
            order.status.as_str()
        )));
    }

    let result = LabResultEntry {
        id: Uuid::new_v4(),
        lab_order_id: order.id,
        parameter: req.parameter,
        value: req.value,
        unit: req.unit,
        reference_range: req.reference_range,
        is_abnormal: req.is_abnormal,
        notes: req.notes,
        recorded_by: auth.id,
        created_at: Utc::now().naive_utc(),
    };
    repository::insert_lab_result(&conn, &result)?;
    Ok(Json(result))
}

fn fetch_order(conn: &rusqlite::Connection, id: &Uuid) -> Result<LabOrder, ApiError> {
    repository::get_lab_order(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Lab order not found".into()))
}
