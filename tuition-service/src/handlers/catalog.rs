//! Catalog handlers: standards, subjects and the fee matrix.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CreateStandard, CreateSubject, FeeCell, FeeScheduleRow, SetFeeCell, Standard, Subject,
};
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct AddStandardRequest {
    #[validate(length(min = 1, message = "Standard name cannot be empty"))]
    pub standard_name: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn add_standard(
    State(state): State<AppState>,
    Json(request): Json<AddStandardRequest>,
) -> Result<(StatusCode, Json<Standard>), AppError> {
    request.validate()?;

    let standard = state
        .db
        .create_standard(&CreateStandard {
            standard_name: request.standard_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(standard)))
}

#[tracing::instrument(skip(state))]
pub async fn list_standards(
    State(state): State<AppState>,
) -> Result<Json<Vec<Standard>>, AppError> {
    Ok(Json(state.db.list_standards().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddSubjectRequest {
    #[validate(length(min = 1, message = "Subject name cannot be empty"))]
    pub subject_name: String,
    pub faculty_id: Option<Uuid>,
}

#[tracing::instrument(skip(state, request))]
pub async fn add_subject(
    State(state): State<AppState>,
    Json(request): Json<AddSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    request.validate()?;

    let subject = state
        .db
        .create_subject(&CreateSubject {
            subject_name: request.subject_name,
            faculty_id: request.faculty_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(subject)))
}

#[tracing::instrument(skip(state))]
pub async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(state.db.list_subjects().await?))
}

#[tracing::instrument(skip(state))]
pub async fn fee_schedule(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeeScheduleRow>>, AppError> {
    Ok(Json(state.db.fee_schedule().await?))
}

#[derive(Debug, Deserialize)]
pub struct SetFeeCellRequest {
    pub standard_id: Uuid,
    pub subject_id: Uuid,
    pub amount: Decimal,
}

#[tracing::instrument(skip(state, request))]
pub async fn set_fee_cell(
    State(state): State<AppState>,
    Json(request): Json<SetFeeCellRequest>,
) -> Result<Json<FeeCell>, AppError> {
    if request.amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Fee amount cannot be negative"
        )));
    }

    let cell = state
        .db
        .set_fee_cell(&SetFeeCell {
            standard_id: request.standard_id,
            subject_id: request.subject_id,
            amount: request.amount,
        })
        .await?;

    Ok(Json(cell))
}

#[tracing::instrument(skip(state))]
pub async fn delete_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_subject(subject_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn delete_standard(
    State(state): State<AppState>,
    Path(standard_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_standard(standard_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
