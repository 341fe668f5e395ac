//! Configuration module
//!
//! Environment-driven settings for storage, persistence, the analysis
//! pipeline and storage migration. `.env` files are honoured via `dotenvy`.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::constants::{
    DEFAULT_ANALYSIS_STEPS, DEFAULT_MAX_CONCURRENT_ITEMS, DEFAULT_MIGRATION_CLAIM_TTL_SECS,
    DEFAULT_RETRY_BACKOFF_MAX_MS, DEFAULT_RETRY_BACKOFF_MIN_MS, DEFAULT_STALE_AFTER_SECS,
    DEFAULT_STEP_TIMEOUT_MS, DEFAULT_TEMP_PREFIX,
};
use crate::models::StepName;
use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;

/// Object storage settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    /// First key segment of the upload landing area.
    pub temp_prefix: String,
}

/// Remote analysis pipeline settings
#[derive(Clone)]
pub struct AnalysisConfig {
    pub base_url: Option<String>,
    /// Bearer token for the step endpoints. Never logged.
    pub api_key: Option<String>,
    pub steps: Vec<StepName>,
    pub step_timeout_ms: u64,
    pub retry_backoff_min_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub max_concurrent_items: usize,
    /// Age after which a `processing` row is reported as stale.
    pub stale_after_secs: u64,
}

impl AnalysisConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl Debug for AnalysisConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("steps", &self.steps)
            .field("step_timeout_ms", &self.step_timeout_ms)
            .field("retry_backoff_min_ms", &self.retry_backoff_min_ms)
            .field("retry_backoff_max_ms", &self.retry_backoff_max_ms)
            .field("max_concurrent_items", &self.max_concurrent_items)
            .field("stale_after_secs", &self.stale_after_secs)
            .finish()
    }
}

/// Storage migration settings
#[derive(Clone, Debug)]
pub struct MigrationConfig {
    /// Lifetime of a per-object migration claim.
    pub claim_ttl_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Absent: repositories are kept in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub migration: MigrationConfig,
}

impl Config {
    /// Load from the process environment (after reading `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let steps = match var("ANALYSIS_STEPS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<StepName>)
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_ANALYSIS_STEPS
                .iter()
                .map(|s| s.parse::<StepName>())
                .collect::<Result<Vec<_>, _>>()?,
        };

        let config = Config {
            environment,
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), DB_MAX_CONNECTIONS),
            storage: StorageConfig {
                backend,
                local_storage_path: var("LOCAL_STORAGE_PATH"),
                local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
                s3_bucket: var("S3_BUCKET"),
                s3_region: var("S3_REGION"),
                s3_endpoint: var("S3_ENDPOINT"),
                aws_region: var("AWS_REGION"),
                temp_prefix: var("STORAGE_TEMP_PREFIX")
                    .map(|p| p.trim_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_TEMP_PREFIX.to_string()),
            },
            analysis: AnalysisConfig {
                base_url: var("ANALYSIS_BASE_URL"),
                api_key: var("ANALYSIS_API_KEY"),
                steps,
                step_timeout_ms: parse_or(var("ANALYSIS_STEP_TIMEOUT_MS"), DEFAULT_STEP_TIMEOUT_MS),
                retry_backoff_min_ms: parse_or(
                    var("ANALYSIS_RETRY_BACKOFF_MIN_MS"),
                    DEFAULT_RETRY_BACKOFF_MIN_MS,
                ),
                retry_backoff_max_ms: parse_or(
                    var("ANALYSIS_RETRY_BACKOFF_MAX_MS"),
                    DEFAULT_RETRY_BACKOFF_MAX_MS,
                ),
                max_concurrent_items: parse_or(
                    var("ANALYSIS_MAX_CONCURRENT_ITEMS"),
                    DEFAULT_MAX_CONCURRENT_ITEMS,
                ),
                stale_after_secs: parse_or(var("ANALYSIS_STALE_AFTER_SECS"), DEFAULT_STALE_AFTER_SECS),
            },
            migration: MigrationConfig {
                claim_ttl_secs: parse_or(
                    var("MIGRATION_CLAIM_TTL_SECS"),
                    DEFAULT_MIGRATION_CLAIM_TTL_SECS,
                ),
            },
        };

        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(ref url) = self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("DATABASE_URL must be a valid PostgreSQL connection string");
            }
        }

        match self.storage.backend {
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none()
                    || self.storage.local_storage_base_url.is_none()
                {
                    anyhow::bail!(
                        "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL"
                    );
                }
            }
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    anyhow::bail!("STORAGE_BACKEND=s3 requires S3_BUCKET");
                }
                if self.storage.s3_region.is_none() && self.storage.aws_region.is_none() {
                    anyhow::bail!("STORAGE_BACKEND=s3 requires S3_REGION or AWS_REGION");
                }
            }
        }

        if self.storage.temp_prefix.is_empty() {
            anyhow::bail!("STORAGE_TEMP_PREFIX cannot be empty");
        }

        let analysis = &self.analysis;
        if analysis.steps.is_empty() {
            anyhow::bail!("ANALYSIS_STEPS must name at least one step");
        }
        for (i, step) in analysis.steps.iter().enumerate() {
            if analysis.steps[..i].contains(step) {
                anyhow::bail!("ANALYSIS_STEPS lists '{}' more than once", step);
            }
        }
        if analysis.step_timeout_ms == 0 {
            anyhow::bail!("ANALYSIS_STEP_TIMEOUT_MS must be greater than zero");
        }
        if analysis.retry_backoff_min_ms > analysis.retry_backoff_max_ms {
            anyhow::bail!(
                "ANALYSIS_RETRY_BACKOFF_MIN_MS ({}) exceeds ANALYSIS_RETRY_BACKOFF_MAX_MS ({})",
                analysis.retry_backoff_min_ms,
                analysis.retry_backoff_max_ms
            );
        }
        if analysis.max_concurrent_items == 0 {
            anyhow::bail!("ANALYSIS_MAX_CONCURRENT_ITEMS must be at least 1");
        }
        if self.is_production() && analysis.base_url.is_some() && analysis.api_key.is_none() {
            anyhow::bail!("ANALYSIS_API_KEY is required in production");
        }

        if self.migration.claim_ttl_secs == 0 {
            anyhow::bail!("MIGRATION_CLAIM_TTL_SECS must be greater than zero");
        }

        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}
