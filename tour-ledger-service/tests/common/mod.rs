//! Common test utilities for tour-ledger-service integration tests.
//!
//! `MemoryLedgerStore` and `MemoryBlobStore` share one ordered call log so
//! tests can assert on the sequence of store and blob operations.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use tour_ledger_service::config::{LedgerConfig, SalaryConfig};
use tour_ledger_service::models::{
    ActingUser, Attachment, Expense, InvoiceAmounts, LedgerBinding, NewAttachment,
    NewTransaction, PaySchedule, SalaryProfile, Transaction, TransactionFilter, TransactionMatch,
    TransactionPatch, TransactionStatus, SALARY_CATEGORY,
};
use tour_ledger_service::services::{BlobStore, LedgerStore};
use tour_ledger_service::startup::AppState;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,tour_ledger_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub type CallLog = Arc<Mutex<Vec<String>>>;

type FailureFn = fn() -> AppError;

#[derive(Debug, Clone)]
pub struct BookingRecord {
    pub date_key: Option<String>,
    pub confirmation_code: Option<String>,
    pub document: serde_json::Value,
}

#[derive(Default)]
pub struct StoreState {
    pub bookings: HashMap<Uuid, BookingRecord>,
    pub attachments: Vec<Attachment>,
    pub expenses: Vec<Expense>,
    pub transactions: Vec<Transaction>,
    pub profiles: Vec<SalaryProfile>,
    pub transaction_matches: Vec<TransactionMatch>,
}

/// In-memory `LedgerStore` with a call log and per-method failure injection.
pub struct MemoryLedgerStore {
    pub state: Mutex<StoreState>,
    log: CallLog,
    failures: Mutex<HashMap<&'static str, FailureFn>>,
}

impl MemoryLedgerStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            log,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every later call to `method` fail with `error()`.
    pub fn fail_on(&self, method: &'static str, error: FailureFn) {
        self.failures.lock().unwrap().insert(method, error);
    }

    fn enter(&self, method: &'static str) -> Result<(), AppError> {
        self.log.lock().unwrap().push(format!("store.{}", method));
        match self.failures.lock().unwrap().get(method) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    pub fn add_booking(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.add_booking_with(id, None, serde_json::json!({}));
        id
    }

    pub fn add_booking_with(
        &self,
        id: Uuid,
        date_key: Option<&str>,
        document: serde_json::Value,
    ) {
        self.state.lock().unwrap().bookings.insert(
            id,
            BookingRecord {
                date_key: date_key.map(str::to_string),
                confirmation_code: None,
                document,
            },
        );
    }

    /// Move a booking to another date key, keeping its code.
    pub fn set_date_key(&self, id: Uuid, date_key: &str) {
        if let Some(booking) = self.state.lock().unwrap().bookings.get_mut(&id) {
            booking.date_key = Some(date_key.to_string());
        }
    }

    pub fn booking(&self, id: Uuid) -> Option<BookingRecord> {
        self.state.lock().unwrap().bookings.get(&id).cloned()
    }

    pub fn invoice_index(&self, booking_id: Uuid) -> InvoiceAmounts {
        self.booking(booking_id)
            .map(|b| InvoiceAmounts::from_document(&b.document))
            .unwrap_or_default()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.state.lock().unwrap().expenses.clone()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.state.lock().unwrap().attachments.clone()
    }

    pub fn transaction_matches(&self) -> Vec<TransactionMatch> {
        self.state.lock().unwrap().transaction_matches.clone()
    }

    pub fn set_transaction_status(&self, id: Uuid, status: TransactionStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(tx) = state.transactions.iter_mut().find(|t| t.id == id) {
            tx.status = status;
        }
    }

    /// Insert a row as it would have been written before ledger rows
    /// carried an attachment id.
    pub fn add_legacy_transaction(&self, booking_id: Uuid, description: &str) -> Uuid {
        let row = NewTransaction {
            booking_id: Some(booking_id),
            attachment_id: None,
            owner_id: None,
            kind: tour_ledger_service::models::TransactionKind::Out,
            tx_type: tour_ledger_service::models::TransactionType::Expense,
            category: "hotel".to_string(),
            description: Some(description.to_string()),
            amount: Decimal::from(100),
            currency: "GEL".to_string(),
            date: Utc::now().date_naive(),
            status: TransactionStatus::Pending,
            is_paid: false,
            is_auto_generated: true,
            notes: None,
            period_key: None,
        };
        let tx = materialize(&row);
        let id = tx.id;
        self.state.lock().unwrap().transactions.push(tx);
        id
    }
}

fn materialize(row: &NewTransaction) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        booking_id: row.booking_id,
        attachment_id: row.attachment_id,
        owner_id: row.owner_id,
        kind: row.kind,
        tx_type: row.tx_type,
        category: row.category.clone(),
        description: row.description.clone(),
        amount: row.amount,
        currency: row.currency.clone(),
        date: row.date,
        status: row.status,
        is_paid: row.is_paid,
        is_auto_generated: row.is_auto_generated,
        notes: row.notes.clone(),
        period_key: row.period_key.clone(),
        created_utc: Utc::now(),
    }
}

fn booking_missing(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Booking {} not found", id))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.enter("health_check")
    }

    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, AppError> {
        self.enter("create_attachment")?;
        let mut state = self.state.lock().unwrap();
        if !state.bookings.contains_key(&input.booking_id) {
            return Err(booking_missing(input.booking_id));
        }
        let attachment = Attachment {
            id: Uuid::new_v4(),
            booking_id: input.booking_id,
            file_name: input.file_name.clone(),
            file_path: input.file_path.clone(),
            file_size: input.file_size,
            attachment_type: input.attachment_type,
            uploaded_at: Utc::now(),
            uploaded_by: input.uploaded_by.clone(),
        };
        state.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn get_attachment(&self, attachment_id: Uuid) -> Result<Option<Attachment>, AppError> {
        self.enter("get_attachment")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .attachments
            .iter()
            .find(|a| a.id == attachment_id)
            .cloned())
    }

    async fn list_attachments(&self, booking_id: Uuid) -> Result<Vec<Attachment>, AppError> {
        self.enter("list_attachments")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .attachments
            .iter()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn delete_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError> {
        self.enter("delete_attachment")?;
        let mut state = self.state.lock().unwrap();
        let before = state.attachments.len();
        state.attachments.retain(|a| a.id != attachment_id);
        Ok((before - state.attachments.len()) as u64)
    }

    async fn bind_ledger(
        &self,
        binding: &LedgerBinding,
    ) -> Result<(Expense, Transaction), AppError> {
        self.enter("bind_ledger")?;
        let mut state = self.state.lock().unwrap();
        if binding.invoice_amount.is_some() && !state.bookings.contains_key(&binding.booking_id) {
            return Err(booking_missing(binding.booking_id));
        }

        let expense = Expense {
            id: Uuid::new_v4(),
            attachment_id: binding.expense.attachment_id,
            booking_id: binding.expense.booking_id,
            expense_type: binding.expense.expense_type.clone(),
            description: binding.expense.description.clone(),
            amount: binding.expense.amount,
            expense_date: binding.expense.expense_date,
            created_by: binding.expense.created_by.clone(),
            created_utc: Utc::now(),
        };
        let transaction = materialize(&binding.transaction);

        if let Some(entry) = &binding.invoice_amount {
            if let Some(booking) = state.bookings.get_mut(&binding.booking_id) {
                let mut index = InvoiceAmounts::from_document(&booking.document);
                index.merge(binding.attachment_id, entry.clone());
                index.apply_to_document(&mut booking.document);
            }
        }
        state.expenses.push(expense.clone());
        state.transactions.push(transaction.clone());

        Ok((expense, transaction))
    }

    async fn list_expenses(&self, booking_id: Uuid) -> Result<Vec<Expense>, AppError> {
        self.enter("list_expenses")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .expenses
            .iter()
            .filter(|e| e.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn delete_expenses_by_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError> {
        self.enter("delete_expenses_by_attachment")?;
        let mut state = self.state.lock().unwrap();
        let before = state.expenses.len();
        state
            .expenses
            .retain(|e| e.attachment_id != Some(attachment_id));
        Ok((before - state.expenses.len()) as u64)
    }

    async fn delete_transactions_matching(
        &self,
        matcher: &TransactionMatch,
    ) -> Result<u64, AppError> {
        self.enter("delete_transactions_matching")?;
        let mut state = self.state.lock().unwrap();
        state.transaction_matches.push(matcher.clone());
        let before = state.transactions.len();
        state.transactions.retain(|t| !matcher.matches(t));
        Ok((before - state.transactions.len()) as u64)
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        self.enter("find_transactions")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn insert_transactions(
        &self,
        rows: &[NewTransaction],
    ) -> Result<Vec<Transaction>, AppError> {
        self.enter("insert_transactions")?;
        let mut state = self.state.lock().unwrap();
        let mut inserted = Vec::new();
        for row in rows {
            let duplicate = row.category == SALARY_CATEGORY
                && row.status != TransactionStatus::Void
                && state.transactions.iter().any(|t| {
                    t.category == SALARY_CATEGORY
                        && t.status != TransactionStatus::Void
                        && t.owner_id == row.owner_id
                        && t.period_key == row.period_key
                });
            if duplicate {
                continue;
            }
            let tx = materialize(row);
            state.transactions.push(tx.clone());
            inserted.push(tx);
        }
        Ok(inserted)
    }

    async fn update_transaction(
        &self,
        transaction_id: Uuid,
        patch: &TransactionPatch,
    ) -> Result<(), AppError> {
        self.enter("update_transaction")?;
        let mut state = self.state.lock().unwrap();
        if let Some(tx) = state
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id && !t.is_confirmed())
        {
            tx.amount = patch.amount;
            tx.currency = patch.currency.clone();
            tx.date = patch.date;
            tx.description = Some(patch.description.clone());
            tx.notes = Some(patch.notes.clone());
        }
        Ok(())
    }

    async fn get_invoice_amounts(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<InvoiceAmounts>, AppError> {
        self.enter("get_invoice_amounts")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .get(&booking_id)
            .map(|b| InvoiceAmounts::from_document(&b.document)))
    }

    async fn remove_invoice_amount(
        &self,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool, AppError> {
        self.enter("remove_invoice_amount")?;
        let mut state = self.state.lock().unwrap();
        let Some(booking) = state.bookings.get_mut(&booking_id) else {
            return Ok(false);
        };
        let mut index = InvoiceAmounts::from_document(&booking.document);
        if index.remove(attachment_id).is_none() {
            return Ok(false);
        }
        index.apply_to_document(&mut booking.document);
        Ok(true)
    }

    async fn replace_invoice_amounts(
        &self,
        booking_id: Uuid,
        index: &InvoiceAmounts,
    ) -> Result<(), AppError> {
        self.enter("replace_invoice_amounts")?;
        let mut state = self.state.lock().unwrap();
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| booking_missing(booking_id))?;
        index.apply_to_document(&mut booking.document);
        Ok(())
    }

    async fn count_bookings_with_date_key(
        &self,
        date_key: &str,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<i64, AppError> {
        self.enter("count_bookings_with_date_key")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .filter(|(id, b)| {
                b.date_key.as_deref() == Some(date_key) && Some(**id) != exclude_booking_id
            })
            .count() as i64)
    }

    async fn assign_confirmation_code(
        &self,
        booking_id: Uuid,
        date_key: &str,
        code: &str,
    ) -> Result<(), AppError> {
        self.enter("assign_confirmation_code")?;
        let mut state = self.state.lock().unwrap();
        let taken = !code.starts_with('Z')
            && state.bookings.iter().any(|(id, b)| {
                *id != booking_id && b.confirmation_code.as_deref() == Some(code)
            });
        if taken {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Confirmation code {} is taken",
                code
            )));
        }
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| booking_missing(booking_id))?;
        booking.date_key = Some(date_key.to_string());
        booking.confirmation_code = Some(code.to_string());
        Ok(())
    }

    async fn upsert_salary_profile(
        &self,
        name: &str,
        amount: Decimal,
        currency: &str,
        schedule: PaySchedule,
    ) -> Result<SalaryProfile, AppError> {
        self.enter("upsert_salary_profile")?;
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(profile) = state.profiles.iter_mut().find(|p| p.name == name) {
            profile.amount = amount;
            profile.currency = currency.to_string();
            profile.schedule = schedule;
            profile.is_active = true;
            profile.updated_utc = now;
            return Ok(profile.clone());
        }
        let profile = SalaryProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            amount,
            currency: currency.to_string(),
            is_active: true,
            schedule,
            created_utc: now,
            updated_utc: now,
        };
        state.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn list_salary_profiles(
        &self,
        active_only: bool,
    ) -> Result<Vec<SalaryProfile>, AppError> {
        self.enter("list_salary_profiles")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .profiles
            .iter()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect())
    }

    async fn deactivate_salary_profile(&self, profile_id: Uuid) -> Result<bool, AppError> {
        self.enter("deactivate_salary_profile")?;
        let mut state = self.state.lock().unwrap();
        match state.profiles.iter_mut().find(|p| p.id == profile_id) {
            Some(profile) => {
                profile.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory `BlobStore` writing to the shared call log.
pub struct MemoryBlobStore {
    pub blobs: Mutex<HashMap<String, Vec<u8>>>,
    log: CallLog,
    fail_upload: Mutex<bool>,
    fail_remove: Mutex<bool>,
}

impl MemoryBlobStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            log,
            fail_upload: Mutex::new(false),
            fail_remove: Mutex::new(false),
        }
    }

    pub fn fail_uploads(&self) {
        *self.fail_upload.lock().unwrap() = true;
    }

    pub fn fail_removals(&self) {
        *self.fail_remove.lock().unwrap() = true;
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.log.lock().unwrap().push("blob.upload".to_string());
        if *self.fail_upload.lock().unwrap() {
            return Err(AppError::StorageError(anyhow::anyhow!(
                "Upload of {} refused",
                path
            )));
        }
        self.blobs.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        self.log.lock().unwrap().push("blob.remove".to_string());
        if *self.fail_remove.lock().unwrap() {
            return Err(AppError::StorageError(anyhow::anyhow!(
                "Removal of {} timed out",
                path
            )));
        }
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Store, blob store and their shared call log.
pub struct Harness {
    pub log: CallLog,
    pub store: Arc<MemoryLedgerStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            store: Arc::new(MemoryLedgerStore::new(log.clone())),
            blobs: Arc::new(MemoryBlobStore::new(log.clone())),
            log,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Calls whose name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.blobs.clone(),
            &ledger_config(),
            &salary_config(),
            1024 * 1024,
        )
    }
}

pub fn ledger_config() -> LedgerConfig {
    LedgerConfig {
        base_currency: "GEL".to_string(),
        allowed_currencies: vec!["GEL".to_string(), "USD".to_string(), "EUR".to_string()],
    }
}

pub fn salary_config() -> SalaryConfig {
    SalaryConfig {
        manager_roles: vec!["admin".to_string(), "finance".to_string()],
        reconcile_interval_secs: 0,
    }
}

pub fn agent() -> ActingUser {
    ActingUser::new("agent-7", vec!["agent".to_string()]).unwrap()
}

pub fn finance() -> ActingUser {
    ActingUser::new("finance-1", vec!["finance".to_string()]).unwrap()
}

pub fn permission_denied() -> AppError {
    AppError::Forbidden(anyhow::anyhow!("permission denied for table attachments"))
}

pub fn store_unavailable() -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("connection reset by peer"))
}
