//! Application startup and lifecycle management.

use crate::config::TuitionConfig;
use crate::handlers;
use crate::services::{init_metrics, Database, EmailProvider, MockEmailProvider, SmtpProvider};
use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: TuitionConfig,
    pub db: Database,
    pub email_provider: Arc<dyn EmailProvider>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: TuitionConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;

        let email_provider: Arc<dyn EmailProvider> = if config.smtp.enabled {
            match SmtpProvider::new(config.smtp.clone()) {
                Ok(provider) => {
                    tracing::info!("SMTP email provider initialized");
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP provider: {}. Using mock.", e);
                    Arc::new(MockEmailProvider::new(true))
                }
            }
        } else {
            tracing::info!("SMTP provider disabled, using mock email provider");
            Arc::new(MockEmailProvider::new(true))
        };

        let state = AppState {
            config: config.clone(),
            db,
            email_provider,
        };

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Tuition service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router).await
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_endpoint))
        // Catalog
        .route("/standards", get(handlers::catalog::list_standards))
        .route("/add-standard", post(handlers::catalog::add_standard))
        .route("/subjects", get(handlers::catalog::list_subjects))
        .route("/add-subject", post(handlers::catalog::add_subject))
        .route("/feestructure", get(handlers::catalog::fee_schedule))
        .route("/feestructure/cell", put(handlers::catalog::set_fee_cell))
        .route(
            "/feestructure/subject/:subject_id",
            delete(handlers::catalog::delete_subject),
        )
        .route(
            "/feestructure/standard/:standard_id",
            delete(handlers::catalog::delete_standard),
        )
        // Students
        .route("/studentinfo", post(handlers::students::create_student))
        .route("/students", get(handlers::students::list_students))
        .route(
            "/student-details/:student_id",
            get(handlers::students::student_details),
        )
        .route(
            "/studentfeesdetails/:student_id",
            get(handlers::students::student_fee_details),
        )
        // Faculty
        .route("/add-faculty", post(handlers::faculty::add_faculty))
        .route("/get-faculty", get(handlers::faculty::list_faculty))
        .route(
            "/update-faculty/:faculty_id",
            put(handlers::faculty::update_faculty),
        )
        .route(
            "/delete-faculty/:faculty_id",
            delete(handlers::faculty::delete_faculty),
        )
        // Payment ledger
        .route("/paymentinfo", post(handlers::payments::record_payment))
        .route(
            "/payments/:student_id",
            get(handlers::payments::payment_history),
        )
        .route(
            "/faculty-payment",
            post(handlers::payments::record_faculty_payment),
        )
        .route(
            "/faculty-payments/:faculty_id",
            get(handlers::payments::faculty_payment_history),
        )
        // Receipts
        .route("/generateReceipt", get(handlers::receipts::generate_receipt))
        .route("/sendReceipt", post(handlers::receipts::send_receipt))
        .layer(CorsLayer::permissive())
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}
