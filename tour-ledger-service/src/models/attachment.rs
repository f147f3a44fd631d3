//! Booking attachment model (invoices and payment proofs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of document attached to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Invoice,
    Payment,
}

impl AttachmentType {
    pub const ALL: [AttachmentType; 2] = [AttachmentType::Invoice, AttachmentType::Payment];

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Payment => "payment",
        }
    }

    /// Prefix used in ledger row descriptions ("Invoice: <name>").
    pub fn description_prefix(&self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Payment => "Payment",
        }
    }

    /// Ledger row description for an attachment with the given display name.
    pub fn ledger_description(&self, display_name: &str) -> String {
        format!("{}: {}", self.description_prefix(), display_name)
    }

    /// Only invoices are mirrored into the booking's `invoice_amounts` index.
    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Invoice)
    }
}

impl std::fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttachmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(Self::Invoice),
            "payment" => Ok(Self::Payment),
            other => Err(format!("Invalid attachment type: {}", other)),
        }
    }
}

/// File attached to a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Display name; custom name when one was given at upload.
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub attachment_type: AttachmentType,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

/// Input for creating an attachment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub booking_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub attachment_type: AttachmentType,
    pub uploaded_by: String,
}
