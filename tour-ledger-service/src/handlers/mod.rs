pub mod attachments;
pub mod bookings;
pub mod health;
pub mod salaries;

pub use attachments::{delete_attachment, list_attachments, upload_attachment};
pub use bookings::{assign_confirmation_code, preview_confirmation_code, rebuild_invoice_amounts};
pub use health::{health_check, metrics_handler, readiness_check};
pub use salaries::{deactivate_profile, list_profiles, reconcile, upsert_profile};
