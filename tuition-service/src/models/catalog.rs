//! Catalog models: standards, subjects and the fee-structure matrix.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A grade level (e.g. "8th").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Standard {
    pub standard_id: Uuid,
    pub standard_name: String,
    pub created_utc: DateTime<Utc>,
}

/// A taught course, optionally linked to the external faculty member who
/// is financially responsible for it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub faculty_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// One cell of the fee matrix, joined with the subject name for display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeCell {
    pub standard_id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub amount: Decimal,
}

/// One row of the assembled fee matrix. `total` is always computed from
/// the cells while assembling, never read from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeScheduleRow {
    pub standard_id: Uuid,
    pub standard_name: String,
    pub cells: Vec<FeeScheduleCell>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeScheduleCell {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub amount: Decimal,
}

/// Input for creating a standard.
#[derive(Debug, Clone)]
pub struct CreateStandard {
    pub standard_name: String,
}

/// Input for creating a subject.
#[derive(Debug, Clone)]
pub struct CreateSubject {
    pub subject_name: String,
    pub faculty_id: Option<Uuid>,
}

/// Input for upserting one fee-matrix cell.
#[derive(Debug, Clone)]
pub struct SetFeeCell {
    pub standard_id: Uuid,
    pub subject_id: Uuid,
    pub amount: Decimal,
}
