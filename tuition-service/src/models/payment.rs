//! Payment ledger models for students and faculty.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a payment was made. Cheque carries a cheque number and bank name,
/// Online a transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    Cash,
    Cheque,
    Online,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Cheque => "Cheque",
            PaymentMode::Online => "Online",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "Cash" => Some(PaymentMode::Cash),
            "Cheque" => Some(PaymentMode::Cheque),
            "Online" => Some(PaymentMode::Online),
            _ => None,
        }
    }
}

/// One append-only student ledger entry. `remaining_amt` is the balance
/// snapshot immediately after this payment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub payment_id: Uuid,
    pub student_id: Uuid,
    pub receipt_number: String,
    pub total_amt: Decimal,
    pub amt_paid: Decimal,
    pub remaining_amt: Decimal,
    pub payment_mode: String,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub installment_no: Option<i32>,
    pub collected_by: Option<String>,
    pub paid_on: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a student payment. The student id is already
/// resolved; name lookup happens at the handler boundary.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub student_id: Uuid,
    pub amt_paid: Decimal,
    pub payment_mode: PaymentMode,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub installment_no: Option<i32>,
    pub collected_by: Option<String>,
    pub paid_on: NaiveDate,
}

/// One append-only faculty ledger entry, mirroring [`PaymentRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FacultyPaymentRecord {
    pub payment_id: Uuid,
    pub faculty_id: Uuid,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub payment_mode: String,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub paid_on: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a faculty payment.
#[derive(Debug, Clone)]
pub struct RecordFacultyPayment {
    pub faculty_id: Uuid,
    pub paid_amount: Decimal,
    pub payment_mode: PaymentMode,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub paid_on: NaiveDate,
}

/// A ledger entry joined with the roster fields a receipt needs.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ReceiptRecord {
    pub receipt_number: String,
    pub student_id: Uuid,
    pub student_code: String,
    pub student_name: String,
    pub student_email: String,
    pub phone_no: String,
    pub school_name: String,
    pub board: String,
    pub medium: String,
    pub standard_name: String,
    pub total_amt: Decimal,
    pub amt_paid: Decimal,
    pub remaining_amt: Decimal,
    pub payment_mode: String,
    pub cheque_no: Option<String>,
    pub bank_name: Option<String>,
    pub trans_id: Option<String>,
    pub installment_no: Option<i32>,
    pub collected_by: Option<String>,
    pub paid_on: NaiveDate,
}
