//! Storage and metrics services for tour-ledger-service.

pub mod database;
pub mod metrics;
pub mod storage;
pub mod store;

pub use database::PgLedgerStore;
pub use metrics::{get_metrics, init_metrics, record_error};
pub use storage::LocalBlobStore;
pub use store::{BlobStore, LedgerStore};
