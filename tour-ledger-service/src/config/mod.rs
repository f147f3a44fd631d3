//! Configuration module for tour-ledger-service.

use service_core::config::{self as core_config, env_list, env_or, env_parse, env_required};
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TourLedgerConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub salary: SalaryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub local_path: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Currency of every amount written to the ledger.
    pub base_currency: String,
    pub allowed_currencies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SalaryConfig {
    pub manager_roles: Vec<String>,
    /// Zero disables the periodic worker.
    pub reconcile_interval_secs: u64,
}

impl SalaryConfig {
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

impl TourLedgerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let base_currency = env_or("LEDGER_BASE_CURRENCY", "GEL").trim().to_uppercase();
        let mut allowed_currencies: Vec<String> = env_list("LEDGER_ALLOWED_CURRENCIES", "GEL,USD,EUR")
            .into_iter()
            .map(|c| c.to_uppercase())
            .collect();
        if !allowed_currencies.contains(&base_currency) {
            allowed_currencies.push(base_currency.clone());
        }

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "tour-ledger-service"),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env_required("DATABASE_URL")?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            storage: StorageConfig {
                local_path: env_or("STORAGE_LOCAL_PATH", "./data/attachments"),
                max_upload_bytes: env_parse("STORAGE_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            },
            ledger: LedgerConfig {
                base_currency,
                allowed_currencies,
            },
            salary: SalaryConfig {
                manager_roles: env_list("SALARY_MANAGER_ROLES", "admin,finance")
                    .into_iter()
                    .map(|r| r.to_ascii_lowercase())
                    .collect(),
                reconcile_interval_secs: env_parse("SALARY_RECONCILE_INTERVAL_SECS", 3600)?,
            },
        })
    }
}
