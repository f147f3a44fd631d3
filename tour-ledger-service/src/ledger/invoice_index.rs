//! Rebuild of a booking's `invoice_amounts` from its ledger rows.

use crate::models::{Attachment, Expense, InvoiceAmount, InvoiceAmounts};
use crate::services::LedgerStore;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// The index the ledger implies: one entry per invoice attachment that has a
/// bound expense. Original currency details survive from `current`.
pub fn project(
    attachments: &[Attachment],
    expenses: &[Expense],
    current: &InvoiceAmounts,
) -> InvoiceAmounts {
    attachments
        .iter()
        .filter(|a| a.attachment_type.is_indexed())
        .filter_map(|a| {
            let expense = expenses.iter().find(|e| e.attachment_id == Some(a.id))?;
            let previous = current.get(a.id);
            Some((
                a.id,
                InvoiceAmount {
                    amount: expense.amount,
                    original_currency: previous.and_then(|p| p.original_currency.clone()),
                    original_amount: previous.and_then(|p| p.original_amount),
                },
            ))
        })
        .collect()
}

pub struct InvoiceIndex {
    store: Arc<dyn LedgerStore>,
}

impl InvoiceIndex {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn rebuild(&self, booking_id: Uuid) -> Result<InvoiceAmounts, AppError> {
        let current = self
            .store
            .get_invoice_amounts(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking {} not found", booking_id)))?;

        let attachments = self.store.list_attachments(booking_id).await?;
        let expenses = self.store.list_expenses(booking_id).await?;
        let rebuilt = project(&attachments, &expenses, &current);

        if rebuilt == current {
            info!(entries = rebuilt.len(), "Invoice index already consistent");
            return Ok(rebuilt);
        }

        self.store
            .replace_invoice_amounts(booking_id, &rebuilt)
            .await?;

        info!(
            previous_entries = current.len(),
            entries = rebuilt.len(),
            total = %rebuilt.total(),
            "Invoice index rebuilt"
        );

        Ok(rebuilt)
    }
}
