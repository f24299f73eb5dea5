use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{LabCategory, LabOrderStatus, LabPriority};

/// Master list entry for an orderable lab test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTestType {
    pub id: Uuid,
    pub name: String,
    pub category: LabCategory,
    pub description: String,
    pub unit: Option<String>,
    pub reference_range_min: Option<f64>,
    pub reference_range_max: Option<f64>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub ordered_by: Uuid,
    pub test_type_id: Uuid,
    pub priority: LabPriority,
    pub status: LabOrderStatus,
    pub clinical_notes: String,
    pub collection_date: Option<NaiveDateTime>,
    pub collection_site: Option<String>,
    pub collected_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One measured parameter attached to a lab order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResultEntry {
    pub id: Uuid,
    pub lab_order_id: Uuid,
    pub parameter: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub is_abnormal: bool,
    pub notes: String,
    pub recorded_by: Uuid,
    pub created_at: NaiveDateTime,
}
