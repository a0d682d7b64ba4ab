//! Services module for tuition-service.

pub mod database;
pub mod email;
pub mod fees;
pub mod metrics;
pub mod receipts;

pub use database::Database;
pub use email::{
    EmailAttachment, EmailMessage, EmailProvider, MockEmailProvider, ProviderError,
    ProviderResponse, SmtpProvider,
};
pub use metrics::{get_metrics, init_metrics, record_payment_metric, record_receipt_issued};
