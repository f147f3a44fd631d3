//! Storage seams: the ledger store and the blob store.
//!
//! Every method is its own unit of work. Methods documented as atomic apply
//! all of their writes or none.

use crate::models::{
    Attachment, Expense, InvoiceAmounts, LedgerBinding, NewAttachment, NewTransaction,
    PaySchedule, SalaryProfile, Transaction, TransactionFilter, TransactionMatch,
    TransactionPatch,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Attachments
    // -------------------------------------------------------------------------

    async fn create_attachment(&self, input: &NewAttachment) -> Result<Attachment, AppError>;

    async fn get_attachment(&self, attachment_id: Uuid) -> Result<Option<Attachment>, AppError>;

    async fn list_attachments(&self, booking_id: Uuid) -> Result<Vec<Attachment>, AppError>;

    /// Delete an attachment row, returning the number of rows removed.
    async fn delete_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError>;

    // -------------------------------------------------------------------------
    // Ledger rows
    // -------------------------------------------------------------------------

    /// Atomically write the Expense, the Transaction and (for invoices) the
    /// booking's `invoice_amounts` entry.
    async fn bind_ledger(&self, binding: &LedgerBinding)
        -> Result<(Expense, Transaction), AppError>;

    async fn list_expenses(&self, booking_id: Uuid) -> Result<Vec<Expense>, AppError>;

    async fn delete_expenses_by_attachment(&self, attachment_id: Uuid) -> Result<u64, AppError>;

    async fn delete_transactions_matching(
        &self,
        matcher: &TransactionMatch,
    ) -> Result<u64, AppError>;

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Insert rows in one call. Salary rows that would duplicate a live
    /// (owner, period) occurrence are skipped; only inserted rows are returned.
    async fn insert_transactions(
        &self,
        rows: &[NewTransaction],
    ) -> Result<Vec<Transaction>, AppError>;

    async fn update_transaction(
        &self,
        transaction_id: Uuid,
        patch: &TransactionPatch,
    ) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Booking document index
    // -------------------------------------------------------------------------

    /// `None` when the booking does not exist.
    async fn get_invoice_amounts(&self, booking_id: Uuid)
        -> Result<Option<InvoiceAmounts>, AppError>;

    /// Drop one `invoice_amounts` key; returns whether it was present.
    async fn remove_invoice_amount(
        &self,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn replace_invoice_amounts(
        &self,
        booking_id: Uuid,
        index: &InvoiceAmounts,
    ) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Confirmation codes
    // -------------------------------------------------------------------------

    async fn count_bookings_with_date_key(
        &self,
        date_key: &str,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<i64, AppError>;

    /// Store a code on a booking. Fails with `Conflict` if another booking
    /// already holds a non-saturated code, `NotFound` if the booking is missing.
    async fn assign_confirmation_code(
        &self,
        booking_id: Uuid,
        date_key: &str,
        code: &str,
    ) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Salary profiles
    // -------------------------------------------------------------------------

    /// Insert or update the profile with this name; updating reactivates it.
    async fn upsert_salary_profile(
        &self,
        name: &str,
        amount: Decimal,
        currency: &str,
        schedule: PaySchedule,
    ) -> Result<SalaryProfile, AppError>;

    async fn list_salary_profiles(&self, active_only: bool)
        -> Result<Vec<SalaryProfile>, AppError>;

    /// Returns whether a profile was found.
    async fn deactivate_salary_profile(&self, profile_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn remove(&self, path: &str) -> Result<(), AppError>;
}
