//! heirloom: operator CLI for the media pipeline.
//!
//! Reads configuration from the environment (and `.env`). Without
//! `DATABASE_URL`, analysis state and migration claims are kept in memory.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use heirloom_analysis::{AnalysisOrchestrator, AnalysisStepInvoker, HttpStepTransport};
use heirloom_cli::{
    connect_repositories, describe_media, init_tracing, print_json, run_reports, Repositories,
};
use heirloom_core::Config;
use heirloom_services::StorageMigrator;
use heirloom_storage::{create_storage, key_layout};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "heirloom", about = "Heirloom media pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify media URLs as image, video, audio or unknown
    Classify {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Pick the primary visual of an ordered media list
    Primary { urls: Vec<String> },
    /// Move uploads from the temp namespace to the item's permanent location
    Migrate {
        /// Owner of the uploads
        #[arg(long)]
        owner: Uuid,
        /// Item the uploads belong to
        #[arg(long)]
        item: Uuid,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Mark items as queued for analysis without running anything
    Request {
        #[arg(required = true)]
        items: Vec<Uuid>,
    },
    /// Run the analysis pipeline for one or more items (needs ANALYSIS_BASE_URL)
    Analyze {
        #[arg(required = true)]
        items: Vec<Uuid>,
    },
    /// Show the persisted analysis state of an item
    Status { item: Uuid },
    /// List items stuck in processing
    Stale {
        /// Threshold in seconds (default: ANALYSIS_STALE_AFTER_SECS)
        #[arg(long)]
        older_than_secs: Option<u64>,
    },
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn orchestrator(config: &Config, repos: &Repositories) -> anyhow::Result<AnalysisOrchestrator> {
    let transport = HttpStepTransport::from_config(&config.analysis)?;
    let invoker = AnalysisStepInvoker::from_config(Arc::new(transport), &config.analysis);
    Ok(AnalysisOrchestrator::from_config(
        invoker,
        repos.states.clone(),
        &config.analysis,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { urls } => {
            print_json(&describe_media(&urls).media)?;
        }
        Commands::Primary { urls } => {
            print_json(&describe_media(&urls).primary)?;
        }
        Commands::Migrate { owner, item, urls } => {
            let config = load_config()?;
            let repos = connect_repositories(&config).await?;
            let storage = create_storage(&config.storage)
                .await
                .context("Failed to initialize storage backend")?;
            let layout = key_layout(&config.storage, storage.as_ref());
            let migrator = StorageMigrator::new(
                storage,
                layout,
                repos.claims.clone(),
                Duration::from_secs(config.migration.claim_ttl_secs),
            );

            let outcomes = migrator.migrate_all(&urls, owner, item).await?;
            print_json(&outcomes)?;
        }
        Commands::Request { items } => {
            let config = load_config()?;
            let tracker = connect_repositories(&config).await?.tracker();

            let mut states = Vec::with_capacity(items.len());
            for item in items {
                states.push(tracker.request_analysis(item).await?);
            }
            print_json(&states)?;
        }
        Commands::Analyze { items } => {
            let config = load_config()?;
            let repos = connect_repositories(&config).await?;
            let orchestrator = orchestrator(&config, &repos)?;

            let reports = run_reports(&items, orchestrator.run_many(&items).await);
            print_json(&reports)?;

            let failed = reports.iter().filter(|r| !r.is_done()).count();
            if failed > 0 {
                bail!("{} of {} items failed analysis", failed, reports.len());
            }
        }
        Commands::Status { item } => {
            let config = load_config()?;
            let tracker = connect_repositories(&config).await?.tracker();
            print_json(&tracker.status(item).await?)?;
        }
        Commands::Stale { older_than_secs } => {
            let config = load_config()?;
            let tracker = connect_repositories(&config).await?.tracker();
            let threshold = older_than_secs.unwrap_or(config.analysis.stale_after_secs);
            print_json(&tracker.list_stale(Duration::from_secs(threshold)).await?)?;
        }
    }

    Ok(())
}
