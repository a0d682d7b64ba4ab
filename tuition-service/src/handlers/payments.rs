//! Payment ledger handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    FacultyPaymentRecord, PaymentMode, PaymentRecord, RecordFacultyPayment, RecordPayment,
};
use crate::services::record_payment_metric;
use crate::startup::AppState;
use service_core::error::AppError;

/// Reject unknown modes and enforce the mode-specific reference fields
/// before anything touches the database.
fn validate_mode(
    mode: &str,
    cheque_no: &Option<String>,
    bank_name: &Option<String>,
    trans_id: &Option<String>,
) -> Result<PaymentMode, AppError> {
    let mode = PaymentMode::from_string(mode).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown payment mode '{}'; expected Cash, Cheque or Online",
            mode
        ))
    })?;

    match mode {
        PaymentMode::Cheque => {
            if cheque_no.as_deref().map_or(true, str::is_empty) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cheque payments require a cheque number"
                )));
            }
            if bank_name.as_deref().map_or(true, str::is_empty) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cheque payments require a bank name"
                )));
            }
        }
        PaymentMode::Online => {
            if trans_id.as_deref().map_or(true, str::is_empty) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Online payments require a transaction id"
                )));
            }
        }
        PaymentMode::Cash => {}
    }

    Ok(mode)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    /// Preferred identifier.
    pub student_id: Option<Uuid>,
    /// Compatibility shim; ignored when `student_id` is present.
    pub student_name: Option<String>,
    pub amt_paid: Decimal,
    #[validate(length(min = 1, message = "Payment mode is required"))]
    pub payment_mode: String,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub installment_no: Option<i32>,
    pub collected_by: Option<String>,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub remaining_amt: Decimal,
}

#[tracing::instrument(skip(state, request))]
pub async fn record_payment(
    State(state): State<AppState>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    request.validate()?;

    if request.amt_paid <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let mode = validate_mode(
        &request.payment_mode,
        &request.cheque_no,
        &request.bank_name,
        &request.trans_id,
    )?;

    let student = match (request.student_id, &request.student_name) {
        (Some(student_id), _) => state
            .db
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?,
        (None, Some(name)) => state
            .db
            .find_student_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?,
        (None, None) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A student id or student name is required"
            )))
        }
    };

    let record = state
        .db
        .record_payment(
            &RecordPayment {
                student_id: student.student_id,
                amt_paid: request.amt_paid,
                payment_mode: mode,
                cheque_no: request.cheque_no,
                bank_name: request.bank_name,
                trans_id: request.trans_id,
                installment_no: request.installment_no,
                collected_by: request.collected_by,
                paid_on: request.paid_on,
            },
            state.config.payments.allow_overpayment,
        )
        .await?;

    record_payment_metric("student", mode.as_str());

    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse {
            payment_id: record.payment_id,
            receipt_number: record.receipt_number,
            remaining_amt: record.remaining_amt,
        }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn payment_history(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentRecord>>, AppError> {
    state
        .db
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(state.db.payment_history(student_id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordFacultyPaymentRequest {
    /// Preferred identifier.
    pub faculty_id: Option<Uuid>,
    /// Compatibility shim; ignored when `faculty_id` is present.
    pub faculty_name: Option<String>,
    pub paid_amount: Decimal,
    #[validate(length(min = 1, message = "Payment mode is required"))]
    pub payment_mode: String,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RecordFacultyPaymentResponse {
    pub payment_id: Uuid,
    pub faculty_id: Uuid,
    pub remaining_amount: Decimal,
}

#[tracing::instrument(skip(state, request))]
pub async fn record_faculty_payment(
    State(state): State<AppState>,
    Json(request): Json<RecordFacultyPaymentRequest>,
) -> Result<(StatusCode, Json<RecordFacultyPaymentResponse>), AppError> {
    request.validate()?;

    if request.paid_amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let mode = validate_mode(
        &request.payment_mode,
        &request.cheque_no,
        &request.bank_name,
        &request.trans_id,
    )?;

    let faculty = match (request.faculty_id, &request.faculty_name) {
        (Some(faculty_id), _) => state
            .db
            .get_faculty(faculty_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Faculty not found")))?,
        (None, Some(name)) => state
            .db
            .find_faculty_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Faculty not found")))?,
        (None, None) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A faculty id or faculty name is required"
            )))
        }
    };

    let record = state
        .db
        .record_faculty_payment(&RecordFacultyPayment {
            faculty_id: faculty.faculty_id,
            paid_amount: request.paid_amount,
            payment_mode: mode,
            cheque_no: request.cheque_no,
            bank_name: request.bank_name,
            trans_id: request.trans_id,
            paid_on: request.paid_on,
        })
        .await?;

    record_payment_metric("faculty", mode.as_str());

    Ok((
        StatusCode::CREATED,
        Json(RecordFacultyPaymentResponse {
            payment_id: record.payment_id,
            faculty_id: record.faculty_id,
            remaining_amount: record.remaining_amount,
        }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn faculty_payment_history(
    State(state): State<AppState>,
    Path(faculty_id): Path<Uuid>,
) -> Result<Json<Vec<FacultyPaymentRecord>>, AppError> {
    state
        .db
        .get_faculty(faculty_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Faculty not found")))?;

    Ok(Json(state.db.faculty_payment_history(faculty_id).await?))
}
