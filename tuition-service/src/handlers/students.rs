//! Student roster handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateStudent, Student, StudentDetails, StudentFeeDetails};
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, message = "Student code cannot be empty"))]
    pub student_code: String,
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Phone number cannot be empty"))]
    pub phone_no: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "School name cannot be empty"))]
    pub school_name: String,
    #[validate(length(min = 1, message = "Board cannot be empty"))]
    pub board: String,
    #[validate(length(min = 1, message = "Medium cannot be empty"))]
    pub medium: String,
    pub standard_id: Uuid,
    /// Enrollments; optional, an empty set gives a fee total of 0.
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
}

#[tracing::instrument(skip(state, request), fields(student_code = %request.student_code))]
pub async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    request.validate()?;

    let student = state
        .db
        .create_student(&CreateStudent {
            student_code: request.student_code,
            name: request.name,
            phone_no: request.phone_no,
            email: request.email,
            school_name: request.school_name,
            board: request.board,
            medium: request.medium,
            standard_id: request.standard_id,
            subject_ids: request.subject_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(student)))
}

#[tracing::instrument(skip(state))]
pub async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(state.db.list_students().await?))
}

#[tracing::instrument(skip(state))]
pub async fn student_details(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentDetails>, AppError> {
    Ok(Json(state.db.student_details(student_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn student_fee_details(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentFeeDetails>, AppError> {
    Ok(Json(state.db.student_fee_details(student_id).await?))
}
