//! Salary profile management: role-gated upsert and deactivation.

use crate::models::{ActingUser, SalaryProfile, SalaryProfileInput};
use crate::services::LedgerStore;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

pub struct SalaryProfiles {
    store: Arc<dyn LedgerStore>,
    allowed_currencies: Vec<String>,
    manager_roles: Vec<String>,
}

impl SalaryProfiles {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        allowed_currencies: Vec<String>,
        manager_roles: Vec<String>,
    ) -> Self {
        Self {
            store,
            allowed_currencies,
            manager_roles,
        }
    }

    /// Create or update the profile named `input.name`.
    ///
    /// Authorization is checked first, then value ranges and the currency.
    /// Nothing is written unless all checks pass.
    #[instrument(skip(self, user, input), fields(user_id = %user.id, name = %input.name))]
    pub async fn upsert(
        &self,
        user: &ActingUser,
        input: SalaryProfileInput,
    ) -> Result<SalaryProfile, AppError> {
        user.require_any_role(&self.manager_roles)?;
        input.validate()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Salary profile name cannot be blank"
            )));
        }

        let currency = input.currency.trim().to_uppercase();
        if !self.allowed_currencies.iter().any(|c| c == &currency) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unsupported currency: {} (allowed: {})",
                currency,
                self.allowed_currencies.join(", ")
            )));
        }

        let schedule = input.schedule()?;
        let profile = self
            .store
            .upsert_salary_profile(name, input.amount, &currency, schedule)
            .await?;

        info!(profile_id = %profile.id, frequency = %schedule.frequency(), "Salary profile upserted");
        Ok(profile)
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<SalaryProfile>, AppError> {
        self.store.list_salary_profiles(active_only).await
    }

    /// Stop generating rows for a profile. Unknown ids are not an error.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn deactivate(&self, user: &ActingUser, profile_id: Uuid) -> Result<bool, AppError> {
        user.require_any_role(&self.manager_roles)?;
        let found = self.store.deactivate_salary_profile(profile_id).await?;
        info!(found = found, "Salary profile deactivated");
        Ok(found)
    }

    /// Whether `user` may trigger reconciliation or edit profiles.
    pub fn authorize(&self, user: &ActingUser) -> Result<(), AppError> {
        user.require_any_role(&self.manager_roles)
    }
}
