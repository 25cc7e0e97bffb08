use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::invoicing::InvoiceSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    /// OTLP collector; span export is disabled when unset.
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub invoicing: InvoicingConfig,
}

/// Where invoices and customers are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local, lost on restart. For development and tests.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown storage backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    pub payment_terms_days: u32,
    pub create_attempts: u32,
}

impl From<&InvoicingConfig> for InvoiceSettings {
    fn from(config: &InvoicingConfig) -> Self {
        InvoiceSettings {
            payment_terms_days: config.payment_terms_days,
            create_attempts: config.create_attempts,
        }
    }
}

impl CrmConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let storage: StorageBackend =
            get_env("CRM_STORAGE_BACKEND", Some("postgres"), false)?.parse()?;
        // The database URL only matters when the database is the backend.
        let database_url = match storage {
            StorageBackend::Postgres => get_env("DATABASE_URL", None, is_prod)?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        Ok(CrmConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("crm-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
            storage,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            invoicing: InvoicingConfig {
                payment_terms_days: parse_env("INVOICE_PAYMENT_TERMS_DAYS", 30)?,
                create_attempts: parse_env("INVOICE_CREATE_ATTEMPTS", 3)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Numeric setting; a value that is set but malformed is an error.
fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} must be a number, got '{}'", key, val))
        }),
        Err(_) => Ok(default),
    }
}
