//! Receipt issuance handlers.
//!
//! The primary delivery is an HTTP PDF download; email attachment is a
//! secondary channel layered on the same rendering path.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::{receipts, record_receipt_issued, EmailAttachment, EmailMessage, ProviderError};
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    pub receipt_number: String,
}

#[tracing::instrument(skip(state))]
pub async fn generate_receipt(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Result<Response, AppError> {
    let record = state
        .db
        .receipt_record(&query.receipt_number)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt not found")))?;

    let document = receipts::assemble(&record, &state.config.receipts);
    let bytes = receipts::render_pdf(&document)?;

    record_receipt_issued("download");
    tracing::info!(
        receipt_number = %record.receipt_number,
        size = bytes.len(),
        "Receipt generated"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    receipts::filename(&record.receipt_number)
                ),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendReceiptRequest {
    #[validate(length(min = 1, message = "Receipt number is required"))]
    pub receipt_number: String,
    /// Defaults to the student's stored address.
    #[validate(email(message = "Invalid email address"))]
    pub to_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendReceiptResponse {
    pub receipt_number: String,
    pub delivered_to: String,
    pub status: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn send_receipt(
    State(state): State<AppState>,
    Json(request): Json<SendReceiptRequest>,
) -> Result<(StatusCode, Json<SendReceiptResponse>), AppError> {
    request.validate()?;

    let record = state
        .db
        .receipt_record(&request.receipt_number)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt not found")))?;

    let document = receipts::assemble(&record, &state.config.receipts);
    let bytes = receipts::render_pdf(&document)?;

    let to = request.to_email.unwrap_or_else(|| record.student_email.clone());

    let email = EmailMessage {
        to: to.clone(),
        subject: format!("Payment receipt {}", record.receipt_number),
        body_text: receipts::email_body(&document),
        attachment: Some(EmailAttachment {
            filename: receipts::filename(&record.receipt_number),
            content_type: "application/pdf".to_string(),
            bytes,
        }),
    };

    let status = match state.email_provider.send(&email).await {
        Ok(_) => {
            tracing::info!(
                receipt_number = %record.receipt_number,
                to = %to,
                "Receipt emailed"
            );
            "sent"
        }
        Err(ProviderError::NotEnabled(msg)) => {
            tracing::warn!(
                receipt_number = %record.receipt_number,
                "Email provider not enabled: {}. Reporting mock delivery.",
                msg
            );
            "mocked"
        }
        Err(ProviderError::InvalidRecipient(msg)) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(msg)));
        }
        Err(e) => {
            tracing::error!(
                receipt_number = %record.receipt_number,
                error = %e,
                "Failed to email receipt"
            );
            return Err(AppError::EmailError(e.to_string()));
        }
    };

    record_receipt_issued("email");

    Ok((
        StatusCode::ACCEPTED,
        Json(SendReceiptResponse {
            receipt_number: record.receipt_number,
            delivered_to: to,
            status: status.to_string(),
        }),
    ))
}
