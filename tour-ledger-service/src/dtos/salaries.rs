use crate::models::Period;
use chrono::NaiveDate;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProfileListParams {
    pub active_only: Option<bool>,
}

/// Target of a manual reconciliation: a `YYYY-MM` month or any day of a week.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub month: Option<String>,
    pub week_of: Option<NaiveDate>,
}

impl ReconcileRequest {
    pub fn period(&self) -> Result<Period, AppError> {
        match (&self.month, self.week_of) {
            (Some(month), None) => Period::parse_month(month),
            (None, Some(day)) => Ok(Period::week_of(day)),
            _ => Err(AppError::BadRequest(anyhow::anyhow!(
                "Exactly one of month or week_of is required"
            ))),
        }
    }
}
