//! Attachment removal.
//!
//! Runs in two phases. The database phase checks that the attachment row
//! belongs to the given booking, then deletes the bound ledger rows, the
//! `invoice_amounts` entry and finally the attachment row; any failure
//! there is returned. The blob phase starts only after the database phase
//! has completed and never fails the removal.

use crate::models::{ActingUser, Attachment, AttachmentType, TransactionMatch};
use crate::services::metrics::{ATTACHMENTS_UNBOUND, BLOB_CLEANUP_FAILURES};
use crate::services::{record_error, BlobStore, LedgerStore};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Which attachment to remove, as known to the caller.
#[derive(Debug, Clone)]
pub struct AttachmentRemoval {
    pub attachment_id: Uuid,
    pub booking_id: Uuid,
    /// Informational; the blob removed is the one recorded on the row.
    pub file_path: String,
    pub attachment_type: AttachmentType,
    /// Display name for legacy description matching; the row's own name
    /// when absent.
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnbindReport {
    pub expenses_deleted: u64,
    pub transactions_deleted: u64,
    pub index_entry_removed: bool,
    pub blob_removed: bool,
}

pub struct AttachmentLedgerUnbinder {
    store: Arc<dyn LedgerStore>,
    blobs: Arc<dyn BlobStore>,
}

/// Descriptions an attachment's ledger rows may carry, under either prefix.
pub fn candidate_descriptions(display_name: &str) -> Vec<String> {
    AttachmentType::ALL
        .iter()
        .map(|t| t.ledger_description(display_name))
        .collect()
}

impl AttachmentLedgerUnbinder {
    pub fn new(store: Arc<dyn LedgerStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    #[instrument(
        skip(self, user, removal),
        fields(
            user_id = %user.id,
            attachment_id = %removal.attachment_id,
            booking_id = %removal.booking_id,
            attachment_type = %removal.attachment_type,
        )
    )]
    pub async fn unbind(
        &self,
        user: &ActingUser,
        removal: AttachmentRemoval,
    ) -> Result<UnbindReport, AppError> {
        let (mut report, stored_path) = self.remove_records(&removal).await.map_err(|e| {
            ATTACHMENTS_UNBOUND.with_label_values(&["failed"]).inc();
            record_error(e.kind());
            e
        })?;

        report.blob_removed = self.remove_blob(&stored_path).await;

        ATTACHMENTS_UNBOUND.with_label_values(&["removed"]).inc();
        info!(
            expenses_deleted = report.expenses_deleted,
            transactions_deleted = report.transactions_deleted,
            index_entry_removed = report.index_entry_removed,
            blob_removed = report.blob_removed,
            "Attachment removed"
        );

        Ok(report)
    }

    /// Database phase. Returns the report and the blob path recorded on the
    /// attachment row.
    async fn remove_records(
        &self,
        removal: &AttachmentRemoval,
    ) -> Result<(UnbindReport, String), AppError> {
        let attachment = self.owned_attachment(removal).await?;
        if attachment.file_path != removal.file_path {
            warn!(
                requested = %removal.file_path,
                stored = %attachment.file_path,
                "Removal path differs from attachment row, using stored path"
            );
        }

        let display_name = match removal.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => attachment.file_name.clone(),
        };

        let expenses_deleted = self
            .store
            .delete_expenses_by_attachment(removal.attachment_id)
            .await?;

        let matcher = TransactionMatch {
            attachment_id: removal.attachment_id,
            legacy_descriptions: candidate_descriptions(&display_name),
        };
        let transactions_deleted = self.store.delete_transactions_matching(&matcher).await?;

        let index_entry_removed = if removal.attachment_type.is_indexed() {
            self.store
                .remove_invoice_amount(attachment.booking_id, removal.attachment_id)
                .await?
        } else {
            false
        };

        let deleted = self.store.delete_attachment(removal.attachment_id).await?;
        if deleted == 0 {
            return Err(not_found(removal));
        }

        let report = UnbindReport {
            expenses_deleted,
            transactions_deleted,
            index_entry_removed,
            blob_removed: false,
        };
        Ok((report, attachment.file_path))
    }

    /// The attachment row, provided it exists on the caller's booking.
    /// Anything else is reported as missing before a single write.
    async fn owned_attachment(&self, removal: &AttachmentRemoval) -> Result<Attachment, AppError> {
        match self.store.get_attachment(removal.attachment_id).await? {
            Some(attachment) if attachment.booking_id == removal.booking_id => Ok(attachment),
            _ => Err(not_found(removal)),
        }
    }

    async fn remove_blob(&self, path: &str) -> bool {
        if path.trim().is_empty() {
            return false;
        }
        match self.blobs.remove(path).await {
            Ok(()) => true,
            Err(e) => {
                BLOB_CLEANUP_FAILURES.with_label_values(&["unbind"]).inc();
                warn!(error = %e, path = %path, "Blob removal failed after attachment was deleted");
                false
            }
        }
    }
}

fn not_found(removal: &AttachmentRemoval) -> AppError {
    AppError::NotFound(anyhow::anyhow!(
        "Attachment {} not found on booking {}",
        removal.attachment_id,
        removal.booking_id
    ))
}
