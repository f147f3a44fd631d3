//! Postgres-backed ledger store.

use crate::models::{
    Attachment, AttachmentType, Expense, InvoiceAmounts, LedgerBinding, NewAttachment,
    NewTransaction, PaySchedule, SalaryProfile, Transaction, TransactionFilter, TransactionMatch,
    TransactionPatch,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::LedgerStore;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ATTACHMENT_COLUMNS: &str =
    "id, booking_id, file_name, file_path, file_size, attachment_type, uploaded_at, uploaded_by";

const EXPENSE_COLUMNS: &str =
    "id, attachment_id, booking_id, expense_type, description, amount, expense_date, created_by, created_utc";

const TRANSACTION_COLUMNS: &str = "id, booking_id, attachment_id, owner_id, kind, tx_type, category, description, amount, currency, date, status, is_paid, is_auto_generated, notes, period_key, created_utc";

const SALARY_PROFILE_COLUMNS: &str =
    "id, name, amount, currency, is_active, frequency, due_day, due_weekday, created_utc, updated_utc";

fn corrupt_row(table: &str, id: Uuid, err: String) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("Corrupt {} row {}: {}", table, id, err))
}

#[derive(Debug, FromRow)]
struct AttachmentRow {
    id: Uuid,
    booking_id: Uuid,
    file_name: String,
    file_path: String,
    file_size: Option<i64>,
    attachment_type: String,
    uploaded_at: DateTime<Utc>,
    uploaded_by: String,
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = AppError;

    fn try_from(row: AttachmentRow) -> Result<Self, Self::Error> {
        let attachment_type = row
            .attachment_type
            .parse::<AttachmentType>()
            .map_err(|e| corrupt_row("attachments", row.id, e))?;
        Ok(Self {
            id: row.id,
            booking_id: row.booking_id,
            file_name: row.file_name,
            file_path: row.file_path,
            file_size: row.file_size,
            attachment_type,
            uploaded_at: row.uploaded_at,
            uploaded_by: row.uploaded_by,
        })
    }
}

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: Uuid,
    attachment_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    expense_type: String,
    description: Option<String>,
    amount: Decimal,
    expense_date: NaiveDate,
    created_by: String,
    created_utc: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Self {
            id: row.id,
            attachment_id: row.attachment_id,
            booking_id: row.booking_id,
            expense_type: row.expense_type,
            description: row.description,
            amount: row.amount,
            expense_date: row.expense_date,
            created_by: row.created_by,
            created_utc: row.created_utc,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    booking_id: Option<Uuid>,
    attachment_id: Option<Uuid>,
    owner_id: Option<Uuid>,
    kind: String,
    tx_type: String,
    category: String,
    description: Option<String>,
    amount: Decimal,
    currency: String,
    date: NaiveDate,
    status: String,
    is_paid: bool,
    is_auto_generated: bool,
    notes: Option<String>,
    period_key: Option<String>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Self {
            id,
            booking_id: row.booking_id,
            attachment_id: row.attachment_id,
            owner_id: row.owner_id,
            kind: row.kind.parse().map_err(|e| corrupt_row("transactions", id, e))?,
            tx_type: row
                .tx_type
                .parse()
                .map_err(|e| corrupt_row("transactions", id, e))?,
            category: row.category,
            description: row.description,
            amount: row.amount,
            currency: row.currency,
            date: row.date,
            status: row.status.parse().map_err(|e| corrupt_row("transactions", id, e))?,
            is_paid: row.is_paid,
            is_auto_generated: row.is_auto_generated,
            notes: row.notes,
            period_key: row.period_key,
            created_utc: row.created_utc,
        })
    }
}

#[derive(Debug, FromRow)]
struct SalaryProfileRow {
    id: Uuid,
    name: String,
    amount: Decimal,
    currency: String,
    is_active: bool,
    frequency: String,
    due_day: Option<i32>,
    due_weekday: Option<i32>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<SalaryProfileRow> for SalaryProfile {
    type Error = AppError;

    fn try_from(row: SalaryProfileRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let schedule = match (row.frequency.as_str(), row.due_day, row.due_weekday) {
            ("monthly", Some(day), _) => PaySchedule::monthly(day.max(0) as u32),
            ("weekly", _, Some(weekday)) => PaySchedule::weekly(weekday.max(0) as u32),
            (frequency, _, _) => {
                return Err(corrupt_row(
                    "salary_profiles",
                    id,
                    format!("frequency {} without its due field", frequency),
                ))
            }
        }
        .map_err(|e| corrupt_row("salary_profiles", id, e.to_string()))?;

        Ok(Self {
            id,
            name: row.name,
            amount: row.amount,
            currency: row.currency,
            is_active: row.is_active,
            schedule,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new database connection pool, retrying while Postgres comes up.
    #[instrument(skip(database_url), fields(service = "tour-ledger-service"))]
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

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..ExponentialBackoff::default()
        };

        let pool = backoff::future::retry(policy, || async {
            PgPoolOptions::new()
                .max_connections(max_connections)
                .min_connections(min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(600))
                .connect(database_url)
                .await
                .map_err(|e| {
                    warn!(error = %e, "PostgreSQL not reachable yet");
                    backoff::Error::transient(e)
                })
        })
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
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
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Attachment Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(booking_id = %input.booking_id, attachment_type = %input.attachment_type))]
    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_attachment"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO attachments (id, booking_id, file_name, file_path, file_size, attachment_type, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.booking_id)
            .bind(&input.file_name)
            .bind(&input.file_path)
            .bind(input.file_size)
            .bind(input.attachment_type.as_str())
            .bind(&input.uploaded_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::NotFound(anyhow::anyhow!("Booking {} not found", input.booking_id))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create attachment: {}", e)),
            })?;

        timer.observe_duration();

        let attachment = Attachment::try_from(row)?;
        info!(attachment_id = %attachment.id, "Attachment created");
        Ok(attachment)
    }

    #[instrument(skip(self))]
    async fn get_attachment(&self, attachment_id: Uuid) -> Result<Option<Attachment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_attachment"])
            .start_timer();

        let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = $1");
        let row = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(attachment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get attachment: {}", e)))?;

        timer.observe_duration();

        row.map(Attachment::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_attachments(&self, booking_id: Uuid) -> Result<Vec<Attachment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_attachments"])
            .start_timer();

        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE booking_id = $1 ORDER BY uploaded_at, id"
        );
        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list attachments: {}", e))
            })?;

        timer.observe_duration();

        collect(rows)
    }

    #[instrument(skip(self))]
    async fn delete_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_attachment"])
            .start_timer();

        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(attachment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete attachment: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Ledger Operations
    // -------------------------------------------------------------------------

    /// Expense, transaction and index entry share one database transaction.
    #[instrument(skip(self, binding), fields(booking_id = %binding.booking_id, attachment_id = %binding.attachment_id))]
    async fn bind_ledger(
        &self,
        binding: &LedgerBinding,
    ) -> Result<(Expense, Transaction), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bind_ledger"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let expense = &binding.expense;
        let sql = format!(
            r#"
            INSERT INTO expenses (id, attachment_id, booking_id, expense_type, description, amount, expense_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {EXPENSE_COLUMNS}
            "#
        );
        let expense_row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(expense.attachment_id)
            .bind(expense.booking_id)
            .bind(&expense.expense_type)
            .bind(&expense.description)
            .bind(expense.amount)
            .bind(expense.expense_date)
            .bind(&expense.created_by)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert expense: {}", e)))?;

        let row = &binding.transaction;
        let sql = format!(
            r#"
            INSERT INTO transactions (id, booking_id, attachment_id, owner_id, kind, tx_type, category, description, amount, currency, date, status, is_paid, is_auto_generated, notes, period_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let transaction_row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(row.booking_id)
            .bind(row.attachment_id)
            .bind(row.owner_id)
            .bind(row.kind.as_str())
            .bind(row.tx_type.as_str())
            .bind(&row.category)
            .bind(&row.description)
            .bind(row.amount)
            .bind(&row.currency)
            .bind(row.date)
            .bind(row.status.as_str())
            .bind(row.is_paid)
            .bind(row.is_auto_generated)
            .bind(&row.notes)
            .bind(&row.period_key)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert transaction: {}", e))
            })?;

        if let Some(entry) = &binding.invoice_amount {
            // Server-side merge: concurrent edits to other keys survive.
            let result = sqlx::query(
                r#"
                UPDATE bookings
                SET document = jsonb_set(
                        COALESCE(document, '{}'::jsonb),
                        '{invoice_amounts}',
                        COALESCE(document->'invoice_amounts', '{}'::jsonb) || jsonb_build_object($2::text, $3::jsonb),
                        true
                    ),
                    updated_utc = now()
                WHERE id = $1
                "#,
            )
            .bind(binding.booking_id)
            .bind(binding.attachment_id.to_string())
            .bind(Json(entry))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice_amounts: {}", e))
            })?;

            if result.rows_affected() == 0 {
                tx.rollback().await.ok();
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Booking {} not found",
                    binding.booking_id
                )));
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        let expense = Expense::from(expense_row);
        let transaction = Transaction::try_from(transaction_row)?;

        info!(
            expense_id = %expense.id,
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            indexed = binding.invoice_amount.is_some(),
            "Ledger rows bound to attachment"
        );

        Ok((expense, transaction))
    }

    #[instrument(skip(self))]
    async fn list_expenses(&self, booking_id: Uuid) -> Result<Vec<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_expenses"])
            .start_timer();

        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE booking_id = $1 ORDER BY created_utc, id"
        );
        let rows = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list expenses: {}", e)))?;

        timer.observe_duration();

        Ok(rows.into_iter().map(Expense::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_expenses_by_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_expenses_by_attachment"])
            .start_timer();

        let result = sqlx::query("DELETE FROM expenses WHERE attachment_id = $1")
            .bind(attachment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete expenses: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    /// Keyed rows match on `attachment_id`; unkeyed legacy rows match on description.
    #[instrument(skip(self, matcher), fields(attachment_id = %matcher.attachment_id))]
    async fn delete_transactions_matching(
        &self,
        matcher: &TransactionMatch,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_transactions_matching"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE attachment_id = $1
               OR (attachment_id IS NULL AND description = ANY($2))
            "#,
        )
        .bind(matcher.attachment_id)
        .bind(&matcher.legacy_descriptions)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, filter))]
    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_transactions"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE ($1::varchar IS NULL OR category = $1)
              AND ($2::varchar IS NULL OR kind = $2)
              AND ($3::varchar IS NULL OR status <> $3)
              AND ($4::date IS NULL OR date >= $4)
              AND ($5::date IS NULL OR date <= $5)
              AND ($6::uuid[] IS NULL OR owner_id = ANY($6))
              AND ($7::uuid IS NULL OR booking_id = $7)
              AND ($8::varchar IS NULL OR period_key = $8)
            ORDER BY date, created_utc, id
            "#
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.exclude_status.map(|s| s.as_str()))
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(filter.owner_ids.as_deref())
            .bind(filter.booking_id)
            .bind(filter.period_key.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to query transactions: {}", e))
            })?;

        timer.observe_duration();

        collect(rows)
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    async fn insert_transactions(
        &self,
        rows: &[NewTransaction],
    ) -> Result<Vec<Transaction>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_transactions"])
            .start_timer();

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO transactions (id, booking_id, attachment_id, owner_id, kind, tx_type, category, description, amount, currency, date, status, is_paid, is_auto_generated, notes, period_key) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(Uuid::new_v4())
                .push_bind(row.booking_id)
                .push_bind(row.attachment_id)
                .push_bind(row.owner_id)
                .push_bind(row.kind.as_str())
                .push_bind(row.tx_type.as_str())
                .push_bind(row.category.clone())
                .push_bind(row.description.clone())
                .push_bind(row.amount)
                .push_bind(row.currency.clone())
                .push_bind(row.date)
                .push_bind(row.status.as_str())
                .push_bind(row.is_paid)
                .push_bind(row.is_auto_generated)
                .push_bind(row.notes.clone())
                .push_bind(row.period_key.clone());
        });
        builder.push(
            " ON CONFLICT (owner_id, period_key) WHERE category = 'salary' AND status <> 'void' DO NOTHING",
        );
        builder.push(format!(" RETURNING {TRANSACTION_COLUMNS}"));

        let inserted = builder
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert transactions: {}", e))
            })?;

        timer.observe_duration();

        if inserted.len() < rows.len() {
            warn!(
                requested = rows.len(),
                inserted = inserted.len(),
                "Skipped transactions that duplicate a live salary occurrence"
            );
        }

        collect(inserted)
    }

    #[instrument(skip(self, patch))]
    async fn update_transaction(
        &self,
        transaction_id: Uuid,
        patch: &TransactionPatch,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_transaction"])
            .start_timer();

        // Confirmed rows are immutable here even if a caller raced a confirmation.
        sqlx::query(
            r#"
            UPDATE transactions
            SET amount = $2, currency = $3, date = $4, description = $5, notes = $6
            WHERE id = $1 AND status <> 'confirmed'
            "#,
        )
        .bind(transaction_id)
        .bind(patch.amount)
        .bind(&patch.currency)
        .bind(patch.date)
        .bind(&patch.description)
        .bind(&patch.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Booking Document Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn get_invoice_amounts(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<InvoiceAmounts>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_amounts"])
            .start_timer();

        let document: Option<Json<serde_json::Value>> =
            sqlx::query_scalar("SELECT document FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to read booking: {}", e))
                })?;

        timer.observe_duration();

        Ok(document.map(|Json(doc)| InvoiceAmounts::from_document(&doc)))
    }

    #[instrument(skip(self))]
    async fn remove_invoice_amount(
        &self,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_invoice_amount"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET document = document #- ARRAY['invoice_amounts', $2::text],
                updated_utc = now()
            WHERE id = $1
              AND document->'invoice_amounts' ? $2::text
            "#,
        )
        .bind(booking_id)
        .bind(attachment_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice_amounts: {}", e))
        })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, index), fields(entries = index.len()))]
    async fn replace_invoice_amounts(
        &self,
        booking_id: Uuid,
        index: &InvoiceAmounts,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_invoice_amounts"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET document = jsonb_set(COALESCE(document, '{}'::jsonb), '{invoice_amounts}', $2::jsonb, true),
                updated_utc = now()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(Json(index))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to replace invoice_amounts: {}", e))
        })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Booking {} not found",
                booking_id
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Confirmation Code Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn count_bookings_with_date_key(
        &self,
        date_key: &str,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_bookings_with_date_key"])
            .start_timer();

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM bookings
            WHERE date_key = $1
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(date_key)
        .bind(exclude_booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count bookings: {}", e)))?;

        timer.observe_duration();

        Ok(count)
    }

    #[instrument(skip(self))]
    async fn assign_confirmation_code(
        &self,
        booking_id: Uuid,
        date_key: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["assign_confirmation_code"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET confirmation_code = $2, date_key = $3, updated_utc = now()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(code)
        .bind(date_key)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Confirmation code {} is taken", code))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to assign code: {}", e)),
        })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Booking {} not found",
                booking_id
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Salary Profile Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, amount, schedule), fields(frequency = %schedule.frequency()))]
    async fn upsert_salary_profile(
        &self,
        name: &str,
        amount: Decimal,
        currency: &str,
        schedule: PaySchedule,
    ) -> Result<SalaryProfile, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_salary_profile"])
            .start_timer();

        let (due_day, due_weekday) = match schedule {
            PaySchedule::Monthly { due_day } => (Some(due_day as i32), None),
            PaySchedule::Weekly { due_weekday } => (None, Some(due_weekday as i32)),
        };

        let sql = format!(
            r#"
            INSERT INTO salary_profiles (id, name, amount, currency, is_active, frequency, due_day, due_weekday)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE
            SET amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                is_active = TRUE,
                frequency = EXCLUDED.frequency,
                due_day = EXCLUDED.due_day,
                due_weekday = EXCLUDED.due_weekday,
                updated_utc = now()
            RETURNING {SALARY_PROFILE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SalaryProfileRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(amount)
            .bind(currency)
            .bind(schedule.frequency().as_str())
            .bind(due_day)
            .bind(due_weekday)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to upsert salary profile: {}", e))
            })?;

        timer.observe_duration();

        let profile = SalaryProfile::try_from(row)?;
        info!(profile_id = %profile.id, "Salary profile saved");
        Ok(profile)
    }

    #[instrument(skip(self))]
    async fn list_salary_profiles(
        &self,
        active_only: bool,
    ) -> Result<Vec<SalaryProfile>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_salary_profiles"])
            .start_timer();

        let sql = format!(
            "SELECT {SALARY_PROFILE_COLUMNS} FROM salary_profiles WHERE ($1 = FALSE OR is_active) ORDER BY name"
        );
        let rows = sqlx::query_as::<_, SalaryProfileRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list salary profiles: {}", e))
            })?;

        timer.observe_duration();

        collect(rows)
    }

    #[instrument(skip(self))]
    async fn deactivate_salary_profile(&self, profile_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_salary_profile"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE salary_profiles SET is_active = FALSE, updated_utc = now() WHERE id = $1",
        )
        .bind(profile_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate salary profile: {}", e))
        })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }
}
