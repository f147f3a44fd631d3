pub mod attachments;
pub mod bookings;
pub mod salaries;

pub use attachments::{
    AttachmentListResponse, AttachmentResponse, DeleteAttachmentRequest,
    UploadAttachmentResponse,
};
pub use bookings::{
    AssignCodeRequest, CodePreviewParams, ConfirmationCodeResponse, InvoiceAmountsResponse,
};
pub use salaries::{ProfileListParams, ReconcileRequest};
