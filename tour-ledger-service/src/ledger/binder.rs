//! Attachment upload: blob, attachment row and (when an amount is given)
//! the bound ledger rows.

use crate::models::{
    ActingUser, Attachment, AttachmentType, Expense, ExpenseCategory, InvoiceAmount,
    LedgerBinding, NewAttachment, NewExpense, NewTransaction, Transaction, TransactionKind,
    TransactionStatus, TransactionType,
};
use crate::services::metrics::{ATTACHMENTS_BOUND, BLOB_CLEANUP_FAILURES};
use crate::services::{record_error, BlobStore, LedgerStore};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// One uploaded file and the money it represents.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub booking_id: Uuid,
    pub file_name: String,
    pub custom_name: Option<String>,
    pub data: Vec<u8>,
    pub attachment_type: AttachmentType,
    /// Amount in the ledger's base currency.
    pub amount: Option<Decimal>,
    pub original_currency: Option<String>,
    pub original_amount: Option<Decimal>,
    /// Booking section the file was uploaded from ("hotel", "transport", ...).
    pub context: Option<String>,
}

impl AttachmentUpload {
    /// Name shown to users and embedded in ledger descriptions.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.file_name.trim())
    }

    /// The amount that produces ledger rows, if any.
    fn ledger_amount(&self) -> Option<Decimal> {
        self.amount.filter(|a| *a > Decimal::ZERO)
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct BoundAttachment {
    pub attachment: Attachment,
    pub expense: Option<Expense>,
    pub transaction: Option<Transaction>,
}

pub struct AttachmentLedgerBinder {
    store: Arc<dyn LedgerStore>,
    blobs: Arc<dyn BlobStore>,
    base_currency: String,
    allowed_currencies: Vec<String>,
}

impl AttachmentLedgerBinder {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        blobs: Arc<dyn BlobStore>,
        base_currency: impl Into<String>,
        allowed_currencies: Vec<String>,
    ) -> Self {
        Self {
            store,
            blobs,
            base_currency: base_currency.into(),
            allowed_currencies,
        }
    }

    fn validate(&self, upload: &AttachmentUpload) -> Result<(), AppError> {
        if upload.display_name().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Attachment needs a file name"
            )));
        }
        if upload.amount.is_some_and(|a| a < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Amount cannot be negative"
            )));
        }
        if upload.original_amount.is_some_and(|a| a < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Original amount cannot be negative"
            )));
        }
        if let Some(currency) = &upload.original_currency {
            if !self
                .allowed_currencies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(currency))
            {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Unsupported currency: {}",
                    currency
                )));
            }
        }
        Ok(())
    }

    /// Store the file and record it against the booking.
    ///
    /// Ledger rows are written only for a positive amount, as a single
    /// store unit. A failure after the attachment row exists is surfaced
    /// and leaves the attachment in place.
    #[instrument(
        skip(self, user, upload),
        fields(
            user_id = %user.id,
            booking_id = %upload.booking_id,
            attachment_type = %upload.attachment_type,
        )
    )]
    pub async fn bind(
        &self,
        user: &ActingUser,
        mut upload: AttachmentUpload,
    ) -> Result<BoundAttachment, AppError> {
        self.validate(&upload)?;

        let display_name = upload.display_name().to_string();
        let blob_path = blob_path(&user.id, upload.booking_id, &display_name);
        let type_label = upload.attachment_type.as_str();

        info!(
            file_name = %display_name,
            size = upload.data.len(),
            "Attachment upload started"
        );

        let data = std::mem::take(&mut upload.data);
        let file_size = i64::try_from(data.len()).ok();
        self.blobs
            .upload(&blob_path, data)
            .await
            .map_err(|e| {
                error!(error = %e, path = %blob_path, "Blob upload failed");
                record_error(e.kind());
                e
            })?;

        let new_attachment = NewAttachment {
            booking_id: upload.booking_id,
            file_name: display_name.clone(),
            file_path: blob_path.clone(),
            file_size,
            attachment_type: upload.attachment_type,
            uploaded_by: user.id.clone(),
        };

        let attachment = match self.store.create_attachment(&new_attachment).await {
            Ok(attachment) => attachment,
            Err(e) => {
                error!(error = %e, "Attachment row could not be created");
                record_error(e.kind());
                self.remove_orphaned_blob(&blob_path).await;
                ATTACHMENTS_BOUND
                    .with_label_values(&[type_label, "failed"])
                    .inc();
                return Err(e);
            }
        };

        let Some(amount) = upload.ledger_amount() else {
            ATTACHMENTS_BOUND
                .with_label_values(&[type_label, "document_only"])
                .inc();
            info!(attachment_id = %attachment.id, "Attachment stored without ledger rows");
            return Ok(BoundAttachment {
                attachment,
                expense: None,
                transaction: None,
            });
        };

        let binding = self.ledger_binding(user, &upload, &attachment, amount);
        let (expense, transaction) = self.store.bind_ledger(&binding).await.map_err(|e| {
            ATTACHMENTS_BOUND
                .with_label_values(&[type_label, "failed"])
                .inc();
            record_error(e.kind());
            error!(
                error = %e,
                attachment_id = %attachment.id,
                "Ledger rows could not be written; attachment kept"
            );
            e
        })?;

        ATTACHMENTS_BOUND
            .with_label_values(&[type_label, "bound"])
            .inc();

        Ok(BoundAttachment {
            attachment,
            expense: Some(expense),
            transaction: Some(transaction),
        })
    }

    fn ledger_binding(
        &self,
        user: &ActingUser,
        upload: &AttachmentUpload,
        attachment: &Attachment,
        amount: Decimal,
    ) -> LedgerBinding {
        let category = ExpenseCategory::infer(upload.context.as_deref());
        let description = upload
            .attachment_type
            .ledger_description(&attachment.file_name);
        let today = Utc::now().date_naive();

        // Payment proofs record money already sent.
        let (status, is_paid) = match upload.attachment_type {
            AttachmentType::Invoice => (TransactionStatus::Pending, false),
            AttachmentType::Payment => (TransactionStatus::Confirmed, true),
        };

        let expense = NewExpense {
            attachment_id: Some(attachment.id),
            booking_id: Some(upload.booking_id),
            expense_type: category.as_str().to_string(),
            description: Some(description.clone()),
            amount,
            expense_date: today,
            created_by: user.id.clone(),
        };

        let transaction = NewTransaction {
            booking_id: Some(upload.booking_id),
            attachment_id: Some(attachment.id),
            owner_id: None,
            kind: TransactionKind::Out,
            tx_type: TransactionType::Expense,
            category: category.as_str().to_string(),
            description: Some(description),
            amount,
            currency: self.base_currency.clone(),
            date: today,
            status,
            is_paid,
            is_auto_generated: true,
            notes: original_amount_note(upload),
            period_key: None,
        };

        let invoice_amount = upload
            .attachment_type
            .is_indexed()
            .then(|| InvoiceAmount {
                amount,
                original_currency: upload.original_currency.as_ref().map(|c| c.to_uppercase()),
                original_amount: upload.original_amount,
            });

        LedgerBinding {
            booking_id: upload.booking_id,
            attachment_id: attachment.id,
            expense,
            transaction,
            invoice_amount,
        }
    }

    async fn remove_orphaned_blob(&self, path: &str) {
        if let Err(e) = self.blobs.remove(path).await {
            BLOB_CLEANUP_FAILURES
                .with_label_values(&["orphaned_upload"])
                .inc();
            warn!(error = %e, path = %path, "Orphaned blob left in storage");
        }
    }
}

fn original_amount_note(upload: &AttachmentUpload) -> Option<String> {
    match (&upload.original_amount, &upload.original_currency) {
        (Some(amount), Some(currency)) => Some(format!(
            "original_amount={} {}",
            amount,
            currency.to_uppercase()
        )),
        _ => None,
    }
}

/// `<user>/<booking>/<unique>-<name>`, each segment reduced to path-safe characters.
pub fn blob_path(user_id: &str, booking_id: Uuid, display_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        path_segment(user_id),
        booking_id,
        Uuid::new_v4(),
        path_segment(display_name)
    )
}

fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
