//! Domain models for tour-ledger-service.

mod actor;
mod attachment;
mod booking;
mod ledger;
mod salary;

pub use actor::ActingUser;
pub use attachment::{Attachment, AttachmentType, NewAttachment};
pub use booking::{InvoiceAmount, InvoiceAmounts};
pub use ledger::{
    Expense, ExpenseCategory, LedgerBinding, NewExpense, NewTransaction, Transaction,
    TransactionFilter, TransactionKind, TransactionMatch, TransactionPatch, TransactionStatus,
    TransactionType,
};
pub use salary::{
    Frequency, PaySchedule, Period, SalaryProfile, SalaryProfileInput, SALARY_CATEGORY,
};
