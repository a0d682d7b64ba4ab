//! Student roster models.

use crate::models::{PaymentRecord, Subject};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered student. `total_fees` is computed once at registration from
/// the fee matrix and stored denormalized; later fee-structure edits do not
/// touch it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    /// Human-entered external code; not required to be unique.
    pub student_code: String,
    pub name: String,
    pub phone_no: String,
    pub email: String,
    pub school_name: String,
    pub board: String,
    pub medium: String,
    pub standard_id: Uuid,
    pub total_fees: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a student with enrollments.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub student_code: String,
    pub name: String,
    pub phone_no: String,
    pub email: String,
    pub school_name: String,
    pub board: String,
    pub medium: String,
    pub standard_id: Uuid,
    pub subject_ids: Vec<Uuid>,
}

/// Full profile view: roster row, resolved standard, enrollments and the
/// latest ledger snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StudentDetails {
    #[serde(flatten)]
    pub student: Student,
    pub standard_name: String,
    pub subjects: Vec<Subject>,
    pub latest_payment: Option<PaymentRecord>,
}

/// Balance summary derived by aggregation over the payment ledger.
#[derive(Debug, Clone, Serialize)]
pub struct StudentFeeDetails {
    pub student_id: Uuid,
    pub name: String,
    pub total_fees: Decimal,
    pub paid_total: Decimal,
    pub remaining: Decimal,
}
