//! Student registration and fee-computation integration tests.

mod common;

use common::{decimal_field, spawn_app, unique};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn registration_computes_total_from_enrolled_subjects() {
    let Some(app) = spawn_app().await else { return };

    // Scenario: standard 8th with Maths 500 and English 300.
    let standard_id = app.create_standard(&unique("8th")).await;
    let maths = app.create_subject(&unique("Maths")).await;
    let english = app.create_subject(&unique("English")).await;
    app.set_fee_cell(standard_id, maths, 500).await;
    app.set_fee_cell(standard_id, english, 300).await;

    let response = app
        .post_json(
            "/studentinfo",
            &json!({
                "student_code": unique("STU"),
                "name": "Asha",
                "phone_no": "9999999999",
                "email": "asha@example.com",
                "school_name": "City School",
                "board": "SSC",
                "medium": "English",
                "standard_id": standard_id,
                "subject_ids": [maths, english],
            }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let student: Value = response.json().await.unwrap();
    assert_eq!(decimal_field(&student["total_fees"]), Decimal::from(800));
}

#[tokio::test]
async fn registration_without_subjects_totals_zero() {
    let Some(app) = spawn_app().await else { return };

    let standard_id = app.create_standard(&unique("8th")).await;
    let student_id = app.create_student(standard_id, &[]).await;

    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["total_fees"]), Decimal::ZERO);
    assert_eq!(decimal_field(&details["remaining"]), Decimal::ZERO);
}

#[tokio::test]
async fn subject_without_fee_cell_contributes_zero() {
    let Some(app) = spawn_app().await else { return };

    let standard_id = app.create_standard(&unique("8th")).await;
    let maths = app.create_subject(&unique("Maths")).await;
    let art = app.create_subject(&unique("Art")).await;
    app.set_fee_cell(standard_id, maths, 500).await;
    // no cell for Art

    let student_id = app.create_student(standard_id, &[maths, art]).await;

    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["total_fees"]), Decimal::from(500));
}

#[tokio::test]
async fn unknown_standard_aborts_registration_entirely() {
    let Some(app) = spawn_app().await else { return };

    let code = unique("STU");
    let response = app
        .post_json(
            "/studentinfo",
            &json!({
                "student_code": &code,
                "name": unique("Ghost"),
                "phone_no": "9999999999",
                "email": "ghost@example.com",
                "school_name": "City School",
                "board": "SSC",
                "medium": "English",
                "standard_id": uuid::Uuid::new_v4(),
                "subject_ids": [],
            }),
        )
        .await;
    assert_eq!(response.status(), 404);

    // No partial insert: the roster has no student with that code.
    let students: Value = app.get("/students").await.json().await.unwrap();
    assert!(!students
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["student_code"].as_str().unwrap() == code));
}

#[tokio::test]
async fn invalid_email_fails_validation() {
    let Some(app) = spawn_app().await else { return };

    let standard_id = app.create_standard(&unique("8th")).await;
    let response = app
        .post_json(
            "/studentinfo",
            &json!({
                "student_code": unique("STU"),
                "name": "Asha",
                "phone_no": "9999999999",
                "email": "not-an-email",
                "school_name": "City School",
                "board": "SSC",
                "medium": "English",
                "standard_id": standard_id,
                "subject_ids": [],
            }),
        )
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn details_resolve_standard_and_enrollments() {
    let Some(app) = spawn_app().await else { return };

    let standard_name = unique("8th");
    let standard_id = app.create_standard(&standard_name).await;
    let maths = app.create_subject(&unique("Maths")).await;
    app.set_fee_cell(standard_id, maths, 500).await;
    let student_id = app.create_student(standard_id, &[maths]).await;

    let details: Value = app
        .get(&format!("/student-details/{}", student_id))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(details["standard_name"].as_str().unwrap(), standard_name);
    assert_eq!(details["subjects"].as_array().unwrap().len(), 1);
    assert!(details["latest_payment"].is_null());
}

#[tokio::test]
async fn details_for_missing_student_are_not_found() {
    let Some(app) = spawn_app().await else { return };

    let response = app
        .get(&format!("/student-details/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn later_fee_structure_edits_do_not_touch_stored_totals() {
    let Some(app) = spawn_app().await else { return };

    let standard_id = app.create_standard(&unique("8th")).await;
    let maths = app.create_subject(&unique("Maths")).await;
    app.set_fee_cell(standard_id, maths, 500).await;
    let student_id = app.create_student(standard_id, &[maths]).await;

    // Raising the fee afterwards leaves the student's total at 500.
    app.set_fee_cell(standard_id, maths, 900).await;

    let details: Value = app
        .get(&format!("/studentfeesdetails/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal_field(&details["total_fees"]), Decimal::from(500));
}
