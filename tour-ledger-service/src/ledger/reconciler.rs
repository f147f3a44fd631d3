//! Salary schedule reconciliation.
//!
//! For one period, every active profile of the period's frequency should
//! own exactly one live salary transaction carrying the profile's current
//! amount, currency and due date. Missing rows are inserted in one batch,
//! drifted pending rows are updated one by one, confirmed rows are left
//! alone.

use crate::models::{
    NewTransaction, Period, SalaryProfile, Transaction, TransactionFilter, TransactionKind,
    TransactionPatch, TransactionStatus, TransactionType, SALARY_CATEGORY,
};
use crate::services::metrics::RECONCILER_WRITES;
use crate::services::LedgerStore;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Writes needed to bring a period in line with its profiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub inserts: Vec<NewTransaction>,
    pub updates: Vec<(Uuid, TransactionPatch)>,
    pub unchanged: usize,
    pub skipped_confirmed: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub period: String,
    pub frequency: String,
    pub profiles: usize,
    pub inserted: usize,
    /// Inserts dropped by the store because a concurrent run got there first.
    pub skipped_duplicates: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_confirmed: usize,
}

/// Decide the writes for `period` from the profiles and the live salary
/// rows already in it. Profiles of another frequency or that are inactive
/// are ignored. When an owner has several rows the first one wins.
pub fn plan(period: Period, profiles: &[SalaryProfile], existing: &[Transaction]) -> ReconcilePlan {
    let mut by_owner: HashMap<Uuid, &Transaction> = HashMap::new();
    for tx in existing {
        if let Some(owner) = tx.owner_id {
            by_owner.entry(owner).or_insert(tx);
        }
    }

    let mut plan = ReconcilePlan::default();

    for profile in profiles.iter().filter(|p| is_due_in(p, period)) {
        let Some(due_date) = period.due_date(&profile.schedule) else {
            continue;
        };

        match by_owner.get(&profile.id) {
            None => plan.inserts.push(NewTransaction {
                booking_id: None,
                attachment_id: None,
                owner_id: Some(profile.id),
                kind: TransactionKind::Out,
                tx_type: TransactionType::Expense,
                category: SALARY_CATEGORY.to_string(),
                description: Some(period.salary_description(&profile.name)),
                amount: profile.amount,
                currency: profile.currency.clone(),
                date: due_date,
                status: TransactionStatus::Pending,
                is_paid: false,
                is_auto_generated: true,
                notes: Some(period.salary_notes(profile.id)),
                period_key: Some(period.key()),
            }),
            Some(tx) if tx.is_confirmed() => plan.skipped_confirmed += 1,
            Some(tx) => {
                let drifted = tx.amount != profile.amount
                    || tx.currency != profile.currency
                    || tx.date != due_date;
                if drifted {
                    plan.updates.push((
                        tx.id,
                        TransactionPatch {
                            amount: profile.amount,
                            currency: profile.currency.clone(),
                            date: due_date,
                            description: period.salary_description(&profile.name),
                            notes: period.salary_notes(profile.id),
                        },
                    ));
                } else {
                    plan.unchanged += 1;
                }
            }
        }
    }

    plan
}

fn is_due_in(profile: &SalaryProfile, period: Period) -> bool {
    profile.is_active && profile.schedule.frequency() == period.frequency()
}

pub struct ScheduleReconciler {
    store: Arc<dyn LedgerStore>,
}

impl ScheduleReconciler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Reconcile `period` against all active profiles in the store.
    pub async fn reconcile_active(&self, period: Period) -> Result<ReconcileReport, AppError> {
        let profiles = self.store.list_salary_profiles(true).await?;
        self.reconcile(period, &profiles).await
    }

    #[instrument(skip(self, profiles), fields(period = %period, roster = profiles.len()))]
    pub async fn reconcile(
        &self,
        period: Period,
        profiles: &[SalaryProfile],
    ) -> Result<ReconcileReport, AppError> {
        let roster: Vec<SalaryProfile> = profiles
            .iter()
            .filter(|p| is_due_in(p, period))
            .cloned()
            .collect();

        let frequency = period.frequency().as_str();
        let mut report = ReconcileReport {
            period: period.key(),
            frequency: frequency.to_string(),
            profiles: roster.len(),
            inserted: 0,
            skipped_duplicates: 0,
            updated: 0,
            unchanged: 0,
            skipped_confirmed: 0,
        };

        if roster.is_empty() {
            debug!("No profiles due in period");
            return Ok(report);
        }

        let filter = TransactionFilter {
            category: Some(SALARY_CATEGORY.to_string()),
            kind: Some(TransactionKind::Out),
            exclude_status: Some(TransactionStatus::Void),
            date_from: Some(period.start()),
            date_to: Some(period.end()),
            owner_ids: Some(roster.iter().map(|p| p.id).collect()),
            booking_id: None,
            period_key: Some(period.key()),
        };
        let existing = self.store.find_transactions(&filter).await?;

        let plan = plan(period, &roster, &existing);
        report.unchanged = plan.unchanged;
        report.skipped_confirmed = plan.skipped_confirmed;

        if plan.skipped_confirmed > 0 {
            RECONCILER_WRITES
                .with_label_values(&[frequency, "skip_confirmed"])
                .inc_by(plan.skipped_confirmed as f64);
        }

        if !plan.inserts.is_empty() {
            let inserted = self.store.insert_transactions(&plan.inserts).await?;
            report.inserted = inserted.len();
            report.skipped_duplicates = plan.inserts.len().saturating_sub(inserted.len());
            RECONCILER_WRITES
                .with_label_values(&[frequency, "insert"])
                .inc_by(inserted.len() as f64);
        }

        for (transaction_id, patch) in &plan.updates {
            self.store.update_transaction(*transaction_id, patch).await?;
            report.updated += 1;
            RECONCILER_WRITES
                .with_label_values(&[frequency, "update"])
                .inc();
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped_confirmed = report.skipped_confirmed,
            "Salary schedule reconciled"
        );

        Ok(report)
    }
}
