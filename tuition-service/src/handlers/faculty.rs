//! External faculty handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateFaculty, ExternalFaculty, FacultySummary, UpdateFaculty};
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct AddFacultyRequest {
    #[validate(length(min = 1, message = "Faculty name cannot be empty"))]
    pub faculty_name: String,
    pub total_fees: Decimal,
    pub payable_fees: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
}

#[tracing::instrument(skip(state, request), fields(faculty_name = %request.faculty_name))]
pub async fn add_faculty(
    State(state): State<AppState>,
    Json(request): Json<AddFacultyRequest>,
) -> Result<(StatusCode, Json<ExternalFaculty>), AppError> {
    request.validate()?;

    if request.payable_fees < Decimal::ZERO || request.paid_amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Fee amounts cannot be negative"
        )));
    }

    let faculty = state
        .db
        .create_faculty(&CreateFaculty {
            faculty_name: request.faculty_name,
            total_fees: request.total_fees,
            payable_fees: request.payable_fees,
            paid_amount: request.paid_amount,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(faculty)))
}

#[tracing::instrument(skip(state))]
pub async fn list_faculty(
    State(state): State<AppState>,
) -> Result<Json<Vec<FacultySummary>>, AppError> {
    Ok(Json(state.db.list_faculty().await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFacultyRequest {
    pub faculty_name: Option<String>,
    pub total_fees: Option<Decimal>,
    pub payable_fees: Option<Decimal>,
}

#[tracing::instrument(skip(state, request))]
pub async fn update_faculty(
    State(state): State<AppState>,
    Path(faculty_id): Path<Uuid>,
    Json(request): Json<UpdateFacultyRequest>,
) -> Result<Json<ExternalFaculty>, AppError> {
    if matches!(&request.faculty_name, Some(name) if name.is_empty()) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Faculty name cannot be empty"
        )));
    }

    let faculty = state
        .db
        .update_faculty(
            faculty_id,
            &UpdateFaculty {
                faculty_name: request.faculty_name,
                total_fees: request.total_fees,
                payable_fees: request.payable_fees,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Faculty not found")))?;

    Ok(Json(faculty))
}

#[tracing::instrument(skip(state))]
pub async fn delete_faculty(
    State(state): State<AppState>,
    Path(faculty_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_faculty(faculty_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Faculty not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
