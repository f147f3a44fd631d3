//! Periodic salary schedule evaluation.

use crate::ledger::ScheduleReconciler;
use crate::models::{Frequency, Period};
use crate::services::record_error;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Reconciles the current month and week on a fixed interval.
pub struct SalaryScheduleWorker {
    reconciler: Arc<ScheduleReconciler>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SalaryScheduleWorker {
    pub fn new(
        reconciler: Arc<ScheduleReconciler>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled. The first pass runs immediately.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Starting salary schedule worker"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Salary schedule worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pass(Utc::now().date_naive()).await;
                }
            }
        }
    }

    /// One evaluation of both schedules for the periods containing `today`.
    pub async fn run_pass(&self, today: NaiveDate) {
        for frequency in [Frequency::Monthly, Frequency::Weekly] {
            let period = Period::containing(frequency, today);
            match self.reconcile_with_retry(period).await {
                Ok(report) => tracing::debug!(
                    period = %period,
                    inserted = report.inserted,
                    updated = report.updated,
                    "Scheduled reconciliation pass finished"
                ),
                Err(e) => {
                    record_error(e.kind());
                    tracing::error!(
                        period = %period,
                        error = %e,
                        "Scheduled reconciliation pass failed"
                    )
                }
            }
        }
    }

    async fn reconcile_with_retry(
        &self,
        period: Period,
    ) -> Result<crate::ledger::ReconcileReport, AppError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..ExponentialBackoff::default()
        };

        retry(policy, || async {
            self.reconciler
                .reconcile_active(period)
                .await
                .map_err(|e| match e {
                    AppError::DatabaseError(_) | AppError::ServiceUnavailable => {
                        tracing::warn!(period = %period, error = %e, "Retrying reconciliation");
                        backoff::Error::transient(e)
                    }
                    other => backoff::Error::permanent(other),
                })
        })
        .await
    }
}
