use crate::ledger::BoundAttachment;
use crate::models::{Attachment, AttachmentType, Expense, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub booking_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub attachment_type: AttachmentType,
    pub uploaded_at: String,
    pub uploaded_by: String,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id.to_string(),
            booking_id: attachment.booking_id.to_string(),
            file_name: attachment.file_name,
            file_path: attachment.file_path,
            file_size: attachment.file_size,
            attachment_type: attachment.attachment_type,
            uploaded_at: attachment.uploaded_at.to_rfc3339(),
            uploaded_by: attachment.uploaded_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadAttachmentResponse {
    pub attachment: AttachmentResponse,
    pub expense: Option<Expense>,
    pub transaction: Option<Transaction>,
}

impl From<BoundAttachment> for UploadAttachmentResponse {
    fn from(bound: BoundAttachment) -> Self {
        Self {
            attachment: bound.attachment.into(),
            expense: bound.expense,
            transaction: bound.transaction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentListResponse {
    pub attachments: Vec<AttachmentResponse>,
    pub total: usize,
}

/// Body of an attachment removal.
#[derive(Debug, Deserialize)]
pub struct DeleteAttachmentRequest {
    pub file_path: String,
    pub attachment_type: AttachmentType,
    pub file_name: Option<String>,
}
