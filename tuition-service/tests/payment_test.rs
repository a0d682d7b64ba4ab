//! Payment ledger integration tests: balance conservation, validation and
//! the concurrency contract.

mod common;

use common::{decimal_field, spawn_app, spawn_app_with_policy, unique};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

/// Standard with one 800-fee subject, one enrolled student.
async fn student_owing_800(app: &common::TestApp) -> Uuid {
    let standard_id = app.create_standard(&unique("8th")).await;
    let subject_id = app.create_subject(&unique("Maths")).await;
    app.set_fee_cell(standard_id, subject_id, 800).await;
    app.create_student(standard_id, &[subject_id]).await
}

#[tokio::test]
async fn sequential_payments_conserve_the_balance() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    // Scenario: pay 300 on day 1, 200 on day 2.
    let first = app.record_cash_payment(student_id, 300, "2025-06-01").await;
    assert_eq!(decimal_field(&first["remaining_amt"]), Decimal::from(500));

    let second = app.record_cash_payment(student_id, 200, "2025-06-02").await;
    assert_eq!(decimal_field(&second["remaining_amt"]), Decimal::from(300));

    // remaining of the latest record equals total minus the sum of all
    // payments, and the derived view agrees.
    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["paid_total"]), Decimal::from(500));
    assert_eq!(decimal_field(&details["remaining"]), Decimal::from(300));

    let history: Value = app
        .get(&format!("/payments/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_payments_do_not_lose_updates() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    app.record_cash_payment(student_id, 300, "2025-06-01").await;
    app.record_cash_payment(student_id, 200, "2025-06-02").await;

    // Two concurrent 100s from remaining=300 must land on 100, not 200.
    let body = json!({
        "student_id": student_id,
        "amt_paid": 100,
        "payment_mode": "Cash",
        "paid_on": "2025-06-03",
    });
    let (first, second) = tokio::join!(
        app.post_json("/paymentinfo", &body),
        app.post_json("/paymentinfo", &body),
    );
    assert_eq!(first.status(), 201);
    assert_eq!(second.status(), 201);

    let first: Value = first.json().await.unwrap();
    let second: Value = second.json().await.unwrap();
    let mut snapshots = vec![
        decimal_field(&first["remaining_amt"]),
        decimal_field(&second["remaining_amt"]),
    ];
    snapshots.sort();
    assert_eq!(snapshots, vec![Decimal::from(100), Decimal::from(200)]);

    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["remaining"]), Decimal::from(100));
}

#[tokio::test]
async fn missing_required_fields_persist_nothing() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    // No amount.
    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "payment_mode": "Cash",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert!(response.status().is_client_error());

    // No mode.
    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 100,
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert!(response.status().is_client_error());

    // No date.
    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 100,
                "payment_mode": "Cash",
            }),
        )
        .await;
    assert!(response.status().is_client_error());

    // Nothing was inserted by any of the rejected requests.
    let history: Value = app
        .get(&format!("/payments/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cheque_payments_require_cheque_fields() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 100,
                "payment_mode": "Cheque",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 100,
                "payment_mode": "Cheque",
                "cheque_no": "123456",
                "bank_name": "State Bank",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn online_payments_require_a_transaction_id() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 100,
                "payment_mode": "Online",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn payment_for_unknown_student_inserts_nothing() {
    let Some(app) = spawn_app().await else { return };

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": Uuid::new_v4(),
                "amt_paid": 100,
                "payment_mode": "Cash",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn receipt_numbers_are_unique_and_prefixed() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    let first = app.record_cash_payment(student_id, 100, "2025-06-01").await;
    let second = app.record_cash_payment(student_id, 100, "2025-06-02").await;

    let first = first["receipt_number"].as_str().unwrap();
    let second = second["receipt_number"].as_str().unwrap();
    assert!(first.starts_with("REC-"));
    assert!(second.starts_with("REC-"));
    assert_ne!(first, second);
}

#[tokio::test]
async fn overpayment_is_recorded_under_the_permissive_default() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    let body = app.record_cash_payment(student_id, 900, "2025-06-01").await;
    assert_eq!(decimal_field(&body["remaining_amt"]), Decimal::from(-100));
}

#[tokio::test]
async fn overpayment_is_rejected_when_policy_forbids_it() {
    let Some(app) = spawn_app_with_policy(false).await else { return };
    let student_id = student_owing_800(&app).await;

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_id": student_id,
                "amt_paid": 900,
                "payment_mode": "Cash",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let history: Value = app
        .get(&format!("/payments/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn name_lookup_shim_resolves_unique_names() {
    let Some(app) = spawn_app().await else { return };

    let standard_id = app.create_standard(&unique("8th")).await;
    let subject_id = app.create_subject(&unique("Maths")).await;
    app.set_fee_cell(standard_id, subject_id, 800).await;

    let name = unique("Asha");
    let response = app
        .post_json(
            "/studentinfo",
            &json!({
                "student_code": unique("STU"),
                "name": &name,
                "phone_no": "9999999999",
                "email": "asha@example.com",
                "school_name": "City School",
                "board": "SSC",
                "medium": "English",
                "standard_id": standard_id,
                "subject_ids": [subject_id],
            }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .post_json(
            "/paymentinfo",
            &json!({
                "student_name": name,
                "amt_paid": 300,
                "payment_mode": "Cash",
                "paid_on": "2025-06-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(decimal_field(&body["remaining_amt"]), Decimal::from(500));
}

#[tokio::test]
async fn backdated_payment_still_conserves_the_balance() {
    let Some(app) = spawn_app().await else { return };
    let student_id = student_owing_800(&app).await;

    app.record_cash_payment(student_id, 300, "2025-06-10").await;
    // Backdated relative to the first payment.
    let body = app.record_cash_payment(student_id, 200, "2025-06-01").await;
    assert_eq!(decimal_field(&body["remaining_amt"]), Decimal::from(300));

    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["remaining"]), Decimal::from(300));
}
