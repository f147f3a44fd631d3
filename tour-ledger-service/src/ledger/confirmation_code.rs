//! Booking confirmation codes: `<letter><date key>`, e.g. `B161026` for the
//! second booking arriving on 16 October 2026.

use crate::services::metrics::CONFIRMATION_CODES;
use crate::services::LedgerStore;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Digits-only key shared by all bookings arriving on `arrival_date` (DDMMYY).
pub fn date_key(arrival_date: NaiveDate) -> String {
    arrival_date.format("%d%m%y").to_string()
}

/// Letter for the booking that follows `existing` others; `Z` from the 26th on.
pub fn sequence_letter(existing: i64) -> char {
    let index = existing.clamp(0, 25) as usize;
    LETTERS[index] as char
}

pub fn confirmation_code(date_key: &str, existing: i64) -> String {
    format!("{}{}", sequence_letter(existing), date_key)
}

pub struct ConfirmationCodeAllocator {
    store: Arc<dyn LedgerStore>,
}

impl ConfirmationCodeAllocator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Code the booking would get now, without storing it.
    /// `exclude` leaves a booking out of the count when it is being re-saved.
    pub async fn preview(
        &self,
        arrival_date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<String, AppError> {
        let key = date_key(arrival_date);
        let existing = self.store.count_bookings_with_date_key(&key, exclude).await?;
        Ok(confirmation_code(&key, existing))
    }

    /// Allocate and store a code for `booking_id`.
    ///
    /// Starts from the current count and moves to the next letter when the
    /// store reports the code as taken. `Z` codes may repeat, so the loop
    /// ends at the latest there.
    #[instrument(skip(self))]
    pub async fn assign(
        &self,
        booking_id: Uuid,
        arrival_date: NaiveDate,
    ) -> Result<String, AppError> {
        let key = date_key(arrival_date);
        let mut existing = self
            .store
            .count_bookings_with_date_key(&key, Some(booking_id))
            .await?;

        loop {
            let code = confirmation_code(&key, existing);
            match self
                .store
                .assign_confirmation_code(booking_id, &key, &code)
                .await
            {
                Ok(()) => {
                    CONFIRMATION_CODES.with_label_values(&["assigned"]).inc();
                    info!(code = %code, "Confirmation code assigned");
                    return Ok(code);
                }
                Err(AppError::Conflict(e)) if existing < 25 => {
                    CONFIRMATION_CODES
                        .with_label_values(&["conflict_retry"])
                        .inc();
                    warn!(code = %code, error = %e, "Confirmation code taken, trying next letter");
                    existing += 1;
                }
                Err(e) => {
                    if matches!(e, AppError::Conflict(_)) {
                        CONFIRMATION_CODES.with_label_values(&["exhausted"]).inc();
                    }
                    return Err(e);
                }
            }
        }
    }
}
