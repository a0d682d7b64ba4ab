//! Receipt assembly and PDF rendering.
//!
//! A receipt is a pure function of the stored ledger entry and the issuer
//! block from configuration: assembling the same record twice yields the
//! same document, so reissuing a receipt is safe to retry.

use crate::config::ReceiptConfig;
use crate::models::ReceiptRecord;
use rust_decimal::Decimal;
use service_core::error::AppError;

/// Everything that ends up on the printed receipt, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDocument {
    pub issuer_name: String,
    pub issuer_address: String,
    pub issuer_phone: String,
    pub receipt_number: String,
    pub student_name: String,
    pub student_code: String,
    pub standard_name: String,
    pub medium: String,
    pub school_name: String,
    pub board: String,
    pub total_amt: String,
    pub amt_paid: String,
    pub remaining_amt: String,
    pub payment_mode: String,
    pub reference_line: Option<String>,
    pub installment_line: Option<String>,
    pub collected_by: Option<String>,
    pub paid_on: String,
}

const DISCLAIMER: &str = "Fees once paid are non-refundable.";

fn format_money(amount: Decimal) -> String {
    format!("{}", amount.round_dp(2))
}

/// Build the printable document from a ledger entry and the issuer block.
pub fn assemble(record: &ReceiptRecord, issuer: &ReceiptConfig) -> ReceiptDocument {
    let reference_line = match record.payment_mode.as_str() {
        "Cheque" => record.cheque_no.as_ref().map(|no| match &record.bank_name {
            Some(bank) => format!("Cheque No: {} ({})", no, bank),
            None => format!("Cheque No: {}", no),
        }),
        "Online" => record
            .trans_id
            .as_ref()
            .map(|id| format!("Transaction ID: {}", id)),
        _ => None,
    };

    ReceiptDocument {
        issuer_name: issuer.issuer_name.clone(),
        issuer_address: issuer.issuer_address.clone(),
        issuer_phone: issuer.issuer_phone.clone(),
        receipt_number: record.receipt_number.clone(),
        student_name: record.student_name.clone(),
        student_code: record.student_code.clone(),
        standard_name: record.standard_name.clone(),
        medium: record.medium.clone(),
        school_name: record.school_name.clone(),
        board: record.board.clone(),
        total_amt: format_money(record.total_amt),
        amt_paid: format_money(record.amt_paid),
        remaining_amt: format_money(record.remaining_amt),
        payment_mode: record.payment_mode.clone(),
        reference_line,
        installment_line: record
            .installment_no
            .map(|n| format!("Installment No: {}", n)),
        collected_by: record
            .collected_by
            .as_ref()
            .map(|by| format!("Collected By: {}", by)),
        paid_on: record.paid_on.format("%d-%m-%Y").to_string(),
    }
}

fn push_line(
    layer: &printpdf::PdfLayerReference,
    font: &printpdf::IndirectFontRef,
    text: &str,
    font_size: f32,
    x: f32,
    y: f32,
) {
    use printpdf::Mm;
    layer.use_text(text, font_size, Mm(x), Mm(y), font);
}

fn divider(layer: &printpdf::PdfLayerReference, y: f32) {
    use printpdf::Mm;
    layer.add_line(printpdf::Line {
        points: vec![
            (printpdf::Point::new(Mm(15.0), Mm(y)), false),
            (printpdf::Point::new(Mm(195.0), Mm(y)), false),
        ],
        is_closed: false,
    });
}

/// Render the document to PDF bytes. A5-ish single page, builtin fonts.
pub fn render_pdf(receipt: &ReceiptDocument) -> Result<Vec<u8>, AppError> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    let (doc, page1, layer1) = PdfDocument::new(
        format!("Payment Receipt {}", receipt.receipt_number),
        Mm(210.0),
        Mm(297.0),
        "Layer 1",
    );
    let layer = doc.get_page(page1).get_layer(layer1);

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to load font: {}", e)))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to load font: {}", e)))?;

    let mut y: f32 = 285.0;

    // Issuer header (left), receipt number (right)
    push_line(&layer, &font_bold, &receipt.issuer_name, 16.0, 15.0, y);
    push_line(&layer, &font_bold, "PAYMENT RECEIPT", 14.0, 140.0, y);
    y -= 7.0;
    if !receipt.issuer_address.is_empty() {
        push_line(&layer, &font, &receipt.issuer_address, 10.0, 15.0, y);
    }
    push_line(&layer, &font_bold, &receipt.receipt_number, 11.0, 140.0, y);
    y -= 5.0;
    if !receipt.issuer_phone.is_empty() {
        push_line(
            &layer,
            &font,
            &format!("Phone: {}", receipt.issuer_phone),
            10.0,
            15.0,
            y,
        );
    }
    push_line(
        &layer,
        &font,
        &format!("Date: {}", receipt.paid_on),
        10.0,
        140.0,
        y,
    );

    y = 265.0;
    divider(&layer, y);

    // Student block
    y -= 10.0;
    push_line(&layer, &font_bold, "Student", 12.0, 15.0, y);
    y -= 7.0;
    push_line(
        &layer,
        &font,
        &format!("Name: {}", receipt.student_name),
        10.0,
        15.0,
        y,
    );
    push_line(
        &layer,
        &font,
        &format!("Student Code: {}", receipt.student_code),
        10.0,
        120.0,
        y,
    );
    y -= 5.0;
    push_line(
        &layer,
        &font,
        &format!("Standard: {}", receipt.standard_name),
        10.0,
        15.0,
        y,
    );
    push_line(
        &layer,
        &font,
        &format!("Medium: {}", receipt.medium),
        10.0,
        120.0,
        y,
    );
    y -= 5.0;
    push_line(
        &layer,
        &font,
        &format!("School: {}", receipt.school_name),
        10.0,
        15.0,
        y,
    );
    push_line(
        &layer,
        &font,
        &format!("Board: {}", receipt.board),
        10.0,
        120.0,
        y,
    );

    y -= 10.0;
    divider(&layer, y);

    // Payment block
    y -= 10.0;
    push_line(&layer, &font_bold, "Payment Details", 12.0, 15.0, y);
    y -= 7.0;
    push_line(
        &layer,
        &font,
        &format!("Total Amount: {}", receipt.total_amt),
        10.0,
        15.0,
        y,
    );
    y -= 5.0;
    push_line(
        &layer,
        &font_bold,
        &format!("Amount Paid: {}", receipt.amt_paid),
        10.0,
        15.0,
        y,
    );
    y -= 5.0;
    push_line(
        &layer,
        &font,
        &format!("Remaining Balance: {}", receipt.remaining_amt),
        10.0,
        15.0,
        y,
    );
    y -= 5.0;
    push_line(
        &layer,
        &font,
        &format!("Payment Mode: {}", receipt.payment_mode),
        10.0,
        15.0,
        y,
    );
    if let Some(reference) = &receipt.reference_line {
        y -= 5.0;
        push_line(&layer, &font, reference, 10.0, 15.0, y);
    }
    if let Some(installment) = &receipt.installment_line {
        y -= 5.0;
        push_line(&layer, &font, installment, 10.0, 15.0, y);
    }
    if let Some(collected_by) = &receipt.collected_by {
        y -= 5.0;
        push_line(&layer, &font, collected_by, 10.0, 15.0, y);
    }

    y -= 10.0;
    divider(&layer, y);

    // Disclaimer footer
    push_line(&layer, &font, DISCLAIMER, 9.0, 15.0, 12.0);

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to render PDF: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to flush PDF: {}", e)))
}

/// Download filename for a receipt.
pub fn filename(receipt_number: &str) -> String {
    format!("Receipt_{}.pdf", receipt_number)
}

/// Plain-text body for the receipt email.
pub fn email_body(receipt: &ReceiptDocument) -> String {
    format!(
        "Dear {},\n\nPlease find attached receipt {} for your payment of {}.\n\
         Remaining balance: {}.\n\n{}\n\nRegards,\n{}",
        receipt.student_name,
        receipt.receipt_number,
        receipt.amt_paid,
        receipt.remaining_amt,
        DISCLAIMER,
        receipt.issuer_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_record() -> ReceiptRecord {
        ReceiptRecord {
            receipt_number: "REC-000042".to_string(),
            student_id: Uuid::nil(),
            student_code: "STU-17".to_string(),
            student_name: "Asha Patel".to_string(),
            student_email: "asha@example.com".to_string(),
            phone_no: "9999999999".to_string(),
            school_name: "City School".to_string(),
            board: "SSC".to_string(),
            medium: "English".to_string(),
            standard_name: "8th".to_string(),
            total_amt: Decimal::from(800),
            amt_paid: Decimal::from(300),
            remaining_amt: Decimal::from(500),
            payment_mode: "Cheque".to_string(),
            cheque_no: Some("123456".to_string()),
            bank_name: Some("State Bank".to_string()),
            trans_id: None,
            installment_no: Some(1),
            collected_by: Some("Front Desk".to_string()),
            paid_on: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        }
    }

    fn issuer() -> ReceiptConfig {
        ReceiptConfig {
            issuer_name: "Sunrise Tuition Center".to_string(),
            issuer_address: "12 MG Road".to_string(),
            issuer_phone: "080-1234".to_string(),
        }
    }

    #[test]
    fn assembly_is_deterministic() {
        let record = sample_record();
        let config = issuer();
        assert_eq!(assemble(&record, &config), assemble(&record, &config));
    }

    #[test]
    fn cheque_receipt_carries_cheque_reference() {
        let receipt = assemble(&sample_record(), &issuer());
        assert_eq!(
            receipt.reference_line.as_deref(),
            Some("Cheque No: 123456 (State Bank)")
        );
        assert_eq!(receipt.amt_paid, "300");
        assert_eq!(receipt.remaining_amt, "500");
        assert_eq!(receipt.paid_on, "01-06-2025");
    }

    #[test]
    fn online_receipt_carries_transaction_reference() {
        let mut record = sample_record();
        record.payment_mode = "Online".to_string();
        record.cheque_no = None;
        record.bank_name = None;
        record.trans_id = Some("TXN-9".to_string());

        let receipt = assemble(&record, &issuer());
        assert_eq!(receipt.reference_line.as_deref(), Some("Transaction ID: TXN-9"));
    }

    #[test]
    fn cash_receipt_has_no_reference_line() {
        let mut record = sample_record();
        record.payment_mode = "Cash".to_string();
        record.cheque_no = None;
        record.bank_name = None;

        let receipt = assemble(&record, &issuer());
        assert_eq!(receipt.reference_line, None);
    }

    #[test]
    fn rendering_produces_a_pdf() {
        let receipt = assemble(&sample_record(), &issuer());
        let bytes = render_pdf(&receipt).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn email_body_names_the_receipt_and_amounts() {
        let receipt = assemble(&sample_record(), &issuer());
        let body = email_body(&receipt);
        assert!(body.contains("REC-000042"));
        assert!(body.contains("300"));
        assert!(body.contains("500"));
        assert!(body.contains("non-refundable"));
    }

    #[test]
    fn download_filename_keeps_the_receipt_number() {
        assert_eq!(filename("REC-000042"), "Receipt_REC-000042.pdf");
    }
}
