//! Database service for tuition-service.
//!
//! All persistence goes through [`Database`]. The two ledger paths
//! (`record_payment`, `record_faculty_payment`) run their read-then-write
//! sequence inside a transaction with the owning row locked, so concurrent
//! submissions for the same student or faculty member serialize.

use crate::models::{
    CreateFaculty, CreateStandard, CreateStudent, CreateSubject, ExternalFaculty,
    FacultyPaymentRecord, FacultySummary, FeeCell, FeeScheduleCell, FeeScheduleRow, PaymentRecord,
    ReceiptRecord, RecordFacultyPayment, RecordPayment, SetFeeCell, Standard, Student,
    StudentDetails, StudentFeeDetails, Subject, UpdateFaculty,
};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "tuition-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Create a standard. Names are unique (exact match).
    #[instrument(skip(self, input), fields(standard_name = %input.standard_name))]
    pub async fn create_standard(&self, input: &CreateStandard) -> Result<Standard, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_standard"])
            .start_timer();

        let standard = sqlx::query_as::<_, Standard>(
            r#"
            INSERT INTO stdmaster (standard_id, standard_name)
            VALUES ($1, $2)
            RETURNING standard_id, standard_name, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.standard_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Standard '{}' already exists",
                    input.standard_name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create standard: {}", e)),
        })?;

        timer.observe_duration();
        info!(standard_id = %standard.standard_id, "Standard created");

        Ok(standard)
    }

    /// List all standards.
    #[instrument(skip(self))]
    pub async fn list_standards(&self) -> Result<Vec<Standard>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_standards"])
            .start_timer();

        let standards = sqlx::query_as::<_, Standard>(
            r#"
            SELECT standard_id, standard_name, created_utc
            FROM stdmaster
            ORDER BY standard_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list standards: {}", e)))?;

        timer.observe_duration();

        Ok(standards)
    }

    /// Create a subject, optionally linked to a faculty member.
    #[instrument(skip(self, input), fields(subject_name = %input.subject_name))]
    pub async fn create_subject(&self, input: &CreateSubject) -> Result<Subject, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subject"])
            .start_timer();

        let subject = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO submaster (subject_id, subject_name, faculty_id)
            VALUES ($1, $2, $3)
            RETURNING subject_id, subject_name, faculty_id, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.subject_name)
        .bind(input.faculty_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Subject '{}' already exists",
                    input.subject_name
                ))
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("Faculty not found"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create subject: {}", e)),
        })?;

        timer.observe_duration();
        info!(subject_id = %subject.subject_id, "Subject created");

        Ok(subject)
    }

    /// List all subjects.
    #[instrument(skip(self))]
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subjects"])
            .start_timer();

        let subjects = sqlx::query_as::<_, Subject>(
            r#"
            SELECT subject_id, subject_name, faculty_id, created_utc
            FROM submaster
            ORDER BY subject_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list subjects: {}", e)))?;

        timer.observe_duration();

        Ok(subjects)
    }

    /// Upsert one cell of the fee matrix.
    #[instrument(skip(self, input), fields(standard_id = %input.standard_id, subject_id = %input.subject_id))]
    pub async fn set_fee_cell(&self, input: &SetFeeCell) -> Result<FeeCell, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_fee_cell"])
            .start_timer();

        let cell = sqlx::query_as::<_, FeeCell>(
            r#"
            WITH upsert AS (
                INSERT INTO feestructure (standard_id, subject_id, amount)
                VALUES ($1, $2, $3)
                ON CONFLICT (standard_id, subject_id) DO UPDATE SET amount = EXCLUDED.amount
                RETURNING standard_id, subject_id, amount
            )
            SELECT u.standard_id, u.subject_id, s.subject_name, u.amount
            FROM upsert u
            JOIN submaster s ON s.subject_id = u.subject_id
            "#,
        )
        .bind(input.standard_id)
        .bind(input.subject_id)
        .bind(input.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("Standard or subject not found"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to set fee cell: {}", e)),
        })?;

        timer.observe_duration();

        Ok(cell)
    }

    /// Assemble the full fee matrix. Row totals are computed here from the
    /// cells, never read from storage.
    #[instrument(skip(self))]
    pub async fn fee_schedule(&self) -> Result<Vec<FeeScheduleRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fee_schedule"])
            .start_timer();

        let standards = self.list_standards().await?;

        let cells = sqlx::query_as::<_, FeeCell>(
            r#"
            SELECT fc.standard_id, fc.subject_id, s.subject_name, fc.amount
            FROM feestructure fc
            JOIN submaster s ON s.subject_id = fc.subject_id
            ORDER BY s.subject_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch fee cells: {}", e)))?;

        let rows = standards
            .into_iter()
            .map(|standard| {
                let row_cells: Vec<FeeScheduleCell> = cells
                    .iter()
                    .filter(|cell| cell.standard_id == standard.standard_id)
                    .map(|cell| FeeScheduleCell {
                        subject_id: cell.subject_id,
                        subject_name: cell.subject_name.clone(),
                        amount: cell.amount,
                    })
                    .collect();
                let total = row_cells.iter().map(|cell| cell.amount).sum();
                FeeScheduleRow {
                    standard_id: standard.standard_id,
                    standard_name: standard.standard_name,
                    cells: row_cells,
                    total,
                }
            })
            .collect();

        timer.observe_duration();

        Ok(rows)
    }

    /// Delete a subject and its fee cells. Rejected while any enrollment
    /// still references the subject.
    #[instrument(skip(self), fields(subject_id = %subject_id))]
    pub async fn delete_subject(&self, subject_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_subject"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let enrolled: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM studentsubjects WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count enrollments: {}", e)))?;

        if enrolled > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Subject has {} enrolled students and cannot be deleted",
                enrolled
            )));
        }

        let result = sqlx::query("DELETE FROM submaster WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete subject: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Subject not found")));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(subject_id = %subject_id, "Subject deleted");

        Ok(())
    }

    /// Delete a standard and its fee cells. Rejected while any student
    /// still references the standard.
    #[instrument(skip(self), fields(standard_id = %standard_id))]
    pub async fn delete_standard(&self, standard_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_standard"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let students: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM studentinfo WHERE standard_id = $1")
                .bind(standard_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count students: {}", e))
                })?;

        if students > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Standard has {} students and cannot be deleted",
                students
            )));
        }

        let result = sqlx::query("DELETE FROM stdmaster WHERE standard_id = $1")
            .bind(standard_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete standard: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Standard not found")));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(standard_id = %standard_id, "Standard deleted");

        Ok(())
    }

    // =========================================================================
    // Fee Computation
    // =========================================================================

    /// Total payable fee for a standard across the given subjects. A subject
    /// with no cell contributes 0; an unknown standard is an error.
    #[instrument(skip(self, subject_ids), fields(standard_id = %standard_id))]
    pub async fn compute_total_fee(
        &self,
        standard_id: Uuid,
        subject_ids: &[Uuid],
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["compute_total_fee"])
            .start_timer();

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stdmaster WHERE standard_id = $1")
                .bind(standard_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check standard: {}", e))
                })?;
        if exists == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Standard not found")));
        }

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let total = fee_total_on(&mut *conn, standard_id, subject_ids)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to compute total fee: {}", e))
            })?;

        timer.observe_duration();

        Ok(total)
    }

    // =========================================================================
    // Student Operations
    // =========================================================================

    /// Register a student with enrollments. The fee total is computed and
    /// persisted in the same transaction; nothing is inserted when the
    /// standard or a subject is unknown.
    #[instrument(skip(self, input), fields(student_code = %input.student_code))]
    pub async fn create_student(&self, input: &CreateStudent) -> Result<Student, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_student"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let standard: Option<Uuid> =
            sqlx::query_scalar("SELECT standard_id FROM stdmaster WHERE standard_id = $1")
                .bind(input.standard_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check standard: {}", e))
                })?;
        if standard.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Standard not found")));
        }

        let total_fees = fee_total_on(&mut *tx, input.standard_id, &input.subject_ids)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to compute total fee: {}", e))
            })?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO studentinfo
                (student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.student_code)
        .bind(&input.name)
        .bind(&input.phone_no)
        .bind(&input.email)
        .bind(&input.school_name)
        .bind(&input.board)
        .bind(&input.medium)
        .bind(input.standard_id)
        .bind(total_fees)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create student: {}", e)))?;

        if !input.subject_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO studentsubjects (student_id, subject_id)
                SELECT $1, unnest($2::uuid[])
                "#,
            )
            .bind(student.student_id)
            .bind(&input.subject_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::NotFound(anyhow::anyhow!("Subject not found"))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to enroll subjects: {}", e)),
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            student_id = %student.student_id,
            total_fees = %student.total_fees,
            "Student registered"
        );

        Ok(student)
    }

    /// List the roster.
    #[instrument(skip(self))]
    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_students"])
            .start_timer();

        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees, created_utc
            FROM studentinfo
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list students: {}", e)))?;

        timer.observe_duration();

        Ok(students)
    }

    /// Get a student by id.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_student"])
            .start_timer();

        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees, created_utc
            FROM studentinfo
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get student: {}", e)))?;

        timer.observe_duration();

        Ok(student)
    }

    /// Compatibility shim: resolve a student by exact name. An ambiguous
    /// name is a conflict; callers should prefer ids.
    #[instrument(skip(self))]
    pub async fn find_student_by_name(&self, name: &str) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_student_by_name"])
            .start_timer();

        let mut students = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees, created_utc
            FROM studentinfo
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find student: {}", e)))?;

        timer.observe_duration();

        if students.len() > 1 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Multiple students named '{}'; use the student id",
                name
            )));
        }

        Ok(students.pop())
    }

    /// Full profile: roster row, standard name, enrollments and the latest
    /// ledger snapshot.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn student_details(&self, student_id: Uuid) -> Result<StudentDetails, AppError> {
        let student = self
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["student_details"])
            .start_timer();

        let standard_name: String =
            sqlx::query_scalar("SELECT standard_name FROM stdmaster WHERE standard_id = $1")
                .bind(student.standard_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to get standard: {}", e))
                })?;

        let subjects = sqlx::query_as::<_, Subject>(
            r#"
            SELECT s.subject_id, s.subject_name, s.faculty_id, s.created_utc
            FROM submaster s
            JOIN studentsubjects ss ON ss.subject_id = s.subject_id
            WHERE ss.student_id = $1
            ORDER BY s.subject_name
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get enrollments: {}", e)))?;

        let latest_payment = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT payment_id, student_id, receipt_number, total_amt, amt_paid, remaining_amt, payment_mode,
                   cheque_no, bank_name, trans_id, installment_no, collected_by, paid_on, created_utc
            FROM student_payments
            WHERE student_id = $1
            ORDER BY paid_on DESC, created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get latest payment: {}", e)))?;

        timer.observe_duration();

        Ok(StudentDetails {
            student,
            standard_name,
            subjects,
            latest_payment,
        })
    }

    /// Balance summary, re-derived by aggregation over the ledger.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn student_fee_details(
        &self,
        student_id: Uuid,
    ) -> Result<StudentFeeDetails, AppError> {
        let student = self
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["student_fee_details"])
            .start_timer();

        let paid_total: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amt_paid) FROM student_payments WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        timer.observe_duration();

        let paid_total = paid_total.unwrap_or(Decimal::ZERO);
        Ok(StudentFeeDetails {
            student_id: student.student_id,
            name: student.name,
            total_fees: student.total_fees,
            paid_total,
            remaining: student.total_fees - paid_total,
        })
    }

    // =========================================================================
    // Payment Ledger Operations
    // =========================================================================

    /// Record a student payment. The student row is locked for the duration
    /// of the transaction and the new remaining balance is re-derived from
    /// the full ledger, so concurrent submissions cannot lose an update and
    /// backdated entries cannot corrupt the running balance.
    #[instrument(skip(self, input), fields(student_id = %input.student_id, mode = input.payment_mode.as_str()))]
    pub async fn record_payment(
        &self,
        input: &RecordPayment,
        allow_overpayment: bool,
    ) -> Result<PaymentRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, student_code, name, phone_no, email, school_name, board, medium, standard_id, total_fees, created_utc
            FROM studentinfo
            WHERE student_id = $1
            FOR UPDATE
            "#,
        )
        .bind(input.student_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock student: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let paid_so_far: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amt_paid) FROM student_payments WHERE student_id = $1",
        )
        .bind(input.student_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        let paid_so_far = paid_so_far.unwrap_or(Decimal::ZERO);
        let new_remaining = student.total_fees - (paid_so_far + input.amt_paid);

        if !allow_overpayment && new_remaining < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment of {} exceeds the remaining balance of {}",
                input.amt_paid,
                student.total_fees - paid_so_far
            )));
        }

        let record = sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO student_payments
                (payment_id, student_id, receipt_number, total_amt, amt_paid, remaining_amt,
                 payment_mode, cheque_no, bank_name, trans_id, installment_no, collected_by, paid_on)
            VALUES ($1, $2, next_receipt_number(), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING payment_id, student_id, receipt_number, total_amt, amt_paid, remaining_amt, payment_mode,
                      cheque_no, bank_name, trans_id, installment_no, collected_by, paid_on, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.student_id)
        .bind(student.total_fees)
        .bind(input.amt_paid)
        .bind(new_remaining)
        .bind(input.payment_mode.as_str())
        .bind(&input.cheque_no)
        .bind(&input.bank_name)
        .bind(&input.trans_id)
        .bind(input.installment_no)
        .bind(&input.collected_by)
        .bind(input.paid_on)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            receipt_number = %record.receipt_number,
            amt_paid = %record.amt_paid,
            remaining_amt = %record.remaining_amt,
            "Payment recorded"
        );

        Ok(record)
    }

    /// Payment history for a student, newest first.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn payment_history(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<PaymentRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payment_history"])
            .start_timer();

        let records = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT payment_id, student_id, receipt_number, total_amt, amt_paid, remaining_amt, payment_mode,
                   cheque_no, bank_name, trans_id, installment_no, collected_by, paid_on, created_utc
            FROM student_payments
            WHERE student_id = $1
            ORDER BY paid_on DESC, created_utc DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(records)
    }

    /// Look up a ledger entry by receipt number, joined with the roster
    /// fields the receipt needs.
    #[instrument(skip(self))]
    pub async fn receipt_record(
        &self,
        receipt_number: &str,
    ) -> Result<Option<ReceiptRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["receipt_record"])
            .start_timer();

        let record = sqlx::query_as::<_, ReceiptRecord>(
            r#"
            SELECT sp.receipt_number, si.student_id, si.student_code, si.name AS student_name,
                   si.email AS student_email, si.phone_no, si.school_name, si.board, si.medium,
                   sm.standard_name, sp.total_amt, sp.amt_paid, sp.remaining_amt, sp.payment_mode,
                   sp.cheque_no, sp.bank_name, sp.trans_id, sp.installment_no, sp.collected_by, sp.paid_on
            FROM student_payments sp
            JOIN studentinfo si ON si.student_id = sp.student_id
            JOIN stdmaster sm ON sm.standard_id = si.standard_id
            WHERE sp.receipt_number = $1
            "#,
        )
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt: {}", e)))?;

        timer.observe_duration();

        Ok(record)
    }

    // =========================================================================
    // Faculty Operations
    // =========================================================================

    /// Register a faculty member. The remaining balance starts at
    /// `payable_fees − paid_amount`.
    #[instrument(skip(self, input), fields(faculty_name = %input.faculty_name))]
    pub async fn create_faculty(&self, input: &CreateFaculty) -> Result<ExternalFaculty, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_faculty"])
            .start_timer();

        let remaining = input.payable_fees - input.paid_amount;
        let faculty = sqlx::query_as::<_, ExternalFaculty>(
            r#"
            INSERT INTO externalfaculty
                (faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.faculty_name)
        .bind(input.total_fees)
        .bind(input.payable_fees)
        .bind(input.paid_amount)
        .bind(remaining)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Faculty '{}' already exists",
                    input.faculty_name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create faculty: {}", e)),
        })?;

        timer.observe_duration();
        info!(faculty_id = %faculty.faculty_id, "Faculty created");

        Ok(faculty)
    }

    /// List faculty with subjects and student counts derived from the
    /// subject link.
    #[instrument(skip(self))]
    pub async fn list_faculty(&self) -> Result<Vec<FacultySummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_faculty"])
            .start_timer();

        let faculty = sqlx::query_as::<_, FacultySummary>(
            r#"
            SELECT f.faculty_id, f.faculty_name, f.total_fees, f.payable_fees, f.paid_amount,
                   f.remaining_amount, f.created_utc, f.updated_utc,
                   COALESCE(array_agg(s.subject_name) FILTER (WHERE s.subject_id IS NOT NULL), '{}') AS subjects,
                   COUNT(DISTINCT ss.student_id) AS student_count
            FROM externalfaculty f
            LEFT JOIN submaster s ON s.faculty_id = f.faculty_id
            LEFT JOIN studentsubjects ss ON ss.subject_id = s.subject_id
            GROUP BY f.faculty_id
            ORDER BY f.faculty_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list faculty: {}", e)))?;

        timer.observe_duration();

        Ok(faculty)
    }

    /// Get a faculty member by id.
    #[instrument(skip(self), fields(faculty_id = %faculty_id))]
    pub async fn get_faculty(&self, faculty_id: Uuid) -> Result<Option<ExternalFaculty>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_faculty"])
            .start_timer();

        let faculty = sqlx::query_as::<_, ExternalFaculty>(
            r#"
            SELECT faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount, created_utc, updated_utc
            FROM externalfaculty
            WHERE faculty_id = $1
            "#,
        )
        .bind(faculty_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get faculty: {}", e)))?;

        timer.observe_duration();

        Ok(faculty)
    }

    /// Compatibility shim: resolve a faculty member by exact name.
    #[instrument(skip(self))]
    pub async fn find_faculty_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ExternalFaculty>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_faculty_by_name"])
            .start_timer();

        let faculty = sqlx::query_as::<_, ExternalFaculty>(
            r#"
            SELECT faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount, created_utc, updated_utc
            FROM externalfaculty
            WHERE faculty_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find faculty: {}", e)))?;

        timer.observe_duration();

        Ok(faculty)
    }

    /// Partial update. Changing `payable_fees` re-derives the remaining
    /// balance against what has been paid so far.
    #[instrument(skip(self, input), fields(faculty_id = %faculty_id))]
    pub async fn update_faculty(
        &self,
        faculty_id: Uuid,
        input: &UpdateFaculty,
    ) -> Result<Option<ExternalFaculty>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_faculty"])
            .start_timer();

        let faculty = sqlx::query_as::<_, ExternalFaculty>(
            r#"
            UPDATE externalfaculty
            SET faculty_name = COALESCE($2, faculty_name),
                total_fees = COALESCE($3, total_fees),
                payable_fees = COALESCE($4, payable_fees),
                remaining_amount = COALESCE($4, payable_fees) - paid_amount,
                updated_utc = now()
            WHERE faculty_id = $1
            RETURNING faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount, created_utc, updated_utc
            "#,
        )
        .bind(faculty_id)
        .bind(&input.faculty_name)
        .bind(input.total_fees)
        .bind(input.payable_fees)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Faculty name already in use"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update faculty: {}", e)),
        })?;

        timer.observe_duration();

        Ok(faculty)
    }

    /// Hard delete. Linked subjects are unlinked, the payment history rows
    /// go with the faculty member.
    #[instrument(skip(self), fields(faculty_id = %faculty_id))]
    pub async fn delete_faculty(&self, faculty_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_faculty"])
            .start_timer();

        let result = sqlx::query("DELETE FROM externalfaculty WHERE faculty_id = $1")
            .bind(faculty_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete faculty: {}", e))
            })?;

        timer.observe_duration();

        if result.rows_affected() > 0 {
            info!(faculty_id = %faculty_id, "Faculty deleted");
        }

        Ok(result.rows_affected() > 0)
    }

    /// Record a faculty payment. The history insert and the denormalized
    /// column update commit together or not at all; the faculty row is
    /// locked first so the two stay in agreement under concurrency.
    #[instrument(skip(self, input), fields(faculty_id = %input.faculty_id, mode = input.payment_mode.as_str()))]
    pub async fn record_faculty_payment(
        &self,
        input: &RecordFacultyPayment,
    ) -> Result<FacultyPaymentRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_faculty_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let faculty = sqlx::query_as::<_, ExternalFaculty>(
            r#"
            SELECT faculty_id, faculty_name, total_fees, payable_fees, paid_amount, remaining_amount, created_utc, updated_utc
            FROM externalfaculty
            WHERE faculty_id = $1
            FOR UPDATE
            "#,
        )
        .bind(input.faculty_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock faculty: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Faculty not found")))?;

        let new_remaining = faculty.remaining_amount - input.paid_amount;

        let record = sqlx::query_as::<_, FacultyPaymentRecord>(
            r#"
            INSERT INTO faculty_payment_history
                (payment_id, faculty_id, paid_amount, remaining_amount, payment_mode, cheque_no, bank_name, trans_id, paid_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING payment_id, faculty_id, paid_amount, remaining_amount, payment_mode, cheque_no, bank_name, trans_id, paid_on, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.faculty_id)
        .bind(input.paid_amount)
        .bind(new_remaining)
        .bind(input.payment_mode.as_str())
        .bind(&input.cheque_no)
        .bind(&input.bank_name)
        .bind(&input.trans_id)
        .bind(input.paid_on)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record faculty payment: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE externalfaculty
            SET paid_amount = paid_amount + $2, remaining_amount = $3, updated_utc = now()
            WHERE faculty_id = $1
            "#,
        )
        .bind(input.faculty_id)
        .bind(input.paid_amount)
        .bind(new_remaining)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update faculty balance: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            faculty_id = %record.faculty_id,
            paid_amount = %record.paid_amount,
            remaining_amount = %record.remaining_amount,
            "Faculty payment recorded"
        );

        Ok(record)
    }

    /// Payment history for a faculty member, newest first.
    #[instrument(skip(self), fields(faculty_id = %faculty_id))]
    pub async fn faculty_payment_history(
        &self,
        faculty_id: Uuid,
    ) -> Result<Vec<FacultyPaymentRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["faculty_payment_history"])
            .start_timer();

        let records = sqlx::query_as::<_, FacultyPaymentRecord>(
            r#"
            SELECT payment_id, faculty_id, paid_amount, remaining_amount, payment_mode, cheque_no, bank_name, trans_id, paid_on, created_utc
            FROM faculty_payment_history
            WHERE faculty_id = $1
            ORDER BY paid_on DESC, created_utc DESC
            "#,
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list faculty payments: {}", e))
        })?;

        timer.observe_duration();

        Ok(records)
    }
}

/// Sum the fee cells for one standard across the given subjects. Subjects
/// without a cell contribute nothing.
async fn fee_total_on(
    conn: &mut PgConnection,
    standard_id: Uuid,
    subject_ids: &[Uuid],
) -> Result<Decimal, sqlx::Error> {
    if subject_ids.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let total: Option<Decimal> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount)
        FROM feestructure
        WHERE standard_id = $1 AND subject_id = ANY($2)
        "#,
    )
    .bind(standard_id)
    .bind(subject_ids)
    .fetch_one(conn)
    .await?;

    Ok(total.unwrap_or(Decimal::ZERO))
}
