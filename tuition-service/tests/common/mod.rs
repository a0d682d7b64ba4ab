//! Common test utilities for tuition-service integration tests.
//!
//! The tests drive the real REST surface against PostgreSQL. Set
//! `TEST_DATABASE_URL` to run them; when it is absent `spawn_app` returns
//! `None` and each test exits early, so the suite passes without
//! infrastructure.

use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use tuition_service::config::{
    DatabaseConfig, PaymentPolicy, ReceiptConfig, SmtpConfig, TuitionConfig,
};
use tuition_service::Application;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,tuition_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawn a test application on a random port, or `None` when no test
/// database is configured.
pub async fn spawn_app() -> Option<TestApp> {
    spawn_app_with_policy(true).await
}

/// Same as [`spawn_app`] but with an explicit overpayment policy.
pub async fn spawn_app_with_policy(allow_overpayment: bool) -> Option<TestApp> {
    init_tracing();

    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let config = TuitionConfig {
        common: CommonConfig { port: 0 },
        database: DatabaseConfig {
            url: Secret::new(database_url),
            max_connections: 4,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "noreply@example.com".to_string(),
            from_name: "Tuition Office".to_string(),
            enabled: false,
        },
        receipts: ReceiptConfig {
            issuer_name: "Test Tuition Center".to_string(),
            issuer_address: "1 Test Lane".to_string(),
            issuer_phone: "000-0000".to_string(),
        },
        payments: PaymentPolicy { allow_overpayment },
    };

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    })
}

/// Unique entity name so test runs sharing a database never collide.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Create a standard and return its id.
    pub async fn create_standard(&self, name: &str) -> Uuid {
        let response = self
            .post_json("/add-standard", &json!({ "standard_name": name }))
            .await;
        assert_eq!(response.status(), 201, "Failed to create standard");
        let body: Value = response.json().await.unwrap();
        body["standard_id"].as_str().unwrap().parse().unwrap()
    }

    /// Create a subject and return its id.
    pub async fn create_subject(&self, name: &str) -> Uuid {
        let response = self
            .post_json("/add-subject", &json!({ "subject_name": name }))
            .await;
        assert_eq!(response.status(), 201, "Failed to create subject");
        let body: Value = response.json().await.unwrap();
        body["subject_id"].as_str().unwrap().parse().unwrap()
    }

    /// Upsert one fee cell.
    pub async fn set_fee_cell(&self, standard_id: Uuid, subject_id: Uuid, amount: i64) {
        let response = self
            .put_json(
                "/feestructure/cell",
                &json!({
                    "standard_id": standard_id,
                    "subject_id": subject_id,
                    "amount": amount,
                }),
            )
            .await;
        assert_eq!(response.status(), 200, "Failed to set fee cell");
    }

    /// Register a student enrolled in the given subjects and return its id.
    pub async fn create_student(&self, standard_id: Uuid, subject_ids: &[Uuid]) -> Uuid {
        let response = self
            .post_json(
                "/studentinfo",
                &json!({
                    "student_code": unique("STU"),
                    "name": unique("Student"),
                    "phone_no": "9999999999",
                    "email": "student@example.com",
                    "school_name": "City School",
                    "board": "SSC",
                    "medium": "English",
                    "standard_id": standard_id,
                    "subject_ids": subject_ids,
                }),
            )
            .await;
        assert_eq!(response.status(), 201, "Failed to create student");
        let body: Value = response.json().await.unwrap();
        body["student_id"].as_str().unwrap().parse().unwrap()
    }

    /// Record a cash payment and return the response body.
    pub async fn record_cash_payment(&self, student_id: Uuid, amount: i64, date: &str) -> Value {
        let response = self
            .post_json(
                "/paymentinfo",
                &json!({
                    "student_id": student_id,
                    "amt_paid": amount,
                    "payment_mode": "Cash",
                    "paid_on": date,
                }),
            )
            .await;
        assert_eq!(response.status(), 201, "Failed to record payment");
        response.json().await.unwrap()
    }
}

/// Parse a Decimal serialized as a JSON string (e.g. "800.00").
pub fn decimal_field(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .expect("invalid decimal")
}
