use anyhow::{Context, Result};
use heirloom_analysis::{AnalysisTracker, PipelineOutcome};
use heirloom_core::{select_primary, AppError, Config, MediaKind, MediaList};
use heirloom_db::{
    setup_database, AnalysisStateRepository, InMemoryAnalysisStateRepository,
    InMemoryMigrationClaimRepository, MigrationClaimRepository, PostgresAnalysisStateRepository,
    PostgresMigrationClaimRepository,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("heirloom=info")),
        )
        .init();
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

pub struct Repositories {
    pub states: Arc<dyn AnalysisStateRepository>,
    pub claims: Arc<dyn MigrationClaimRepository>,
}

impl Repositories {
    /// Status and queue access; needs no analysis endpoint.
    pub fn tracker(&self) -> AnalysisTracker {
        AnalysisTracker::new(self.states.clone())
    }
}

/// PostgreSQL-backed repositories when `DATABASE_URL` is set, in-memory ones otherwise.
pub async fn connect_repositories(config: &Config) -> Result<Repositories> {
    match config.database_url {
        Some(ref url) => {
            let pool = setup_database(url, config.db_max_connections).await?;
            Ok(Repositories {
                states: Arc::new(PostgresAnalysisStateRepository::new(pool.clone())),
                claims: Arc::new(PostgresMigrationClaimRepository::new(pool)),
            })
        }
        None => {
            tracing::warn!("DATABASE_URL not set; analysis state will not outlive this process");
            Ok(Repositories {
                states: Arc::new(InMemoryAnalysisStateRepository::new()),
                claims: Arc::new(InMemoryMigrationClaimRepository::new()),
            })
        }
    }
}

/// One line of `analyze` output: the pipeline outcome, or why it could not run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Finished(PipelineOutcome),
    Aborted { item_id: Uuid, error: String },
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        matches!(self, RunReport::Finished(outcome) if outcome.is_done())
    }
}

/// Pair each item with its result, keeping every entry.
pub fn run_reports(
    items: &[Uuid],
    results: Vec<Result<PipelineOutcome, AppError>>,
) -> Vec<RunReport> {
    items
        .iter()
        .zip(results)
        .map(|(&item_id, result)| match result {
            Ok(outcome) => RunReport::Finished(outcome),
            Err(e) => {
                tracing::error!(item_id = %item_id, error = %e, "Analysis could not run");
                RunReport::Aborted {
                    item_id,
                    error: e.to_string(),
                }
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ClassifiedUrl {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Serialize)]
pub struct MediaReport {
    pub media: Vec<ClassifiedUrl>,
    /// Thumbnail candidate; `None` for audio-only or empty lists.
    pub primary: Option<String>,
}

/// Classify every URL, in order, and pick the primary visual.
pub fn describe_media(urls: &[String]) -> MediaReport {
    let list = MediaList::from_urls(urls.iter().cloned());
    MediaReport {
        media: list
            .iter()
            .map(|m| ClassifiedUrl {
                url: m.url().to_string(),
                kind: m.kind(),
            })
            .collect(),
        primary: select_primary(list.as_slice()).map(String::from),
    }
}
