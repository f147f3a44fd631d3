//! Ledger synchronisation: attachment binding, salary schedules and the
//! booking-level helpers built on the same rows.

pub mod binder;
pub mod confirmation_code;
pub mod invoice_index;
pub mod profiles;
pub mod reconciler;
pub mod unbinder;

pub use binder::{AttachmentLedgerBinder, AttachmentUpload, BoundAttachment};
pub use confirmation_code::ConfirmationCodeAllocator;
pub use invoice_index::InvoiceIndex;
pub use profiles::SalaryProfiles;
pub use reconciler::{ReconcilePlan, ReconcileReport, ScheduleReconciler};
pub use unbinder::{AttachmentLedgerUnbinder, AttachmentRemoval, UnbindReport};
