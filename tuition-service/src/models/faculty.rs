//! External faculty models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A contracted external teacher. `remaining_amount` is the denormalized
/// running balance, kept in lockstep with `faculty_payment_history` by the
/// payment path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExternalFaculty {
    pub faculty_id: Uuid,
    pub faculty_name: String,
    pub total_fees: Decimal,
    pub payable_fees: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Listing view: the row plus values derived from the subject link.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FacultySummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub faculty: ExternalFaculty,
    pub subjects: Vec<String>,
    pub student_count: i64,
}

/// Input for registering a faculty member.
#[derive(Debug, Clone)]
pub struct CreateFaculty {
    pub faculty_name: String,
    pub total_fees: Decimal,
    pub payable_fees: Decimal,
    pub paid_amount: Decimal,
}

/// Partial update. `payable_fees` changes re-derive `remaining_amount`.
#[derive(Debug, Clone, Default)]
pub struct UpdateFaculty {
    pub faculty_name: Option<String>,
    pub total_fees: Option<Decimal>,
    pub payable_fees: Option<Decimal>,
}
