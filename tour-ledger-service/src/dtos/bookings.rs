use crate::models::InvoiceAmounts;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct InvoiceAmountsResponse {
    pub booking_id: Uuid,
    pub total: Decimal,
    pub invoice_amounts: InvoiceAmounts,
}

#[derive(Debug, Deserialize)]
pub struct AssignCodeRequest {
    pub arrival_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CodePreviewParams {
    pub arrival_date: NaiveDate,
    pub exclude: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmationCodeResponse {
    pub booking_id: Option<Uuid>,
    pub confirmation_code: String,
}
