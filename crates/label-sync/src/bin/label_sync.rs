//! CLI for label-sync.
//!
//! Run `label-sync --help` for usage information.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use label_sync::server::{self, AppState};
use label_sync::{
    BulkResync, Config, FanOutDriver, GitHubClient, LabelEvent, Reconciler, RepositoryEnumerator,
};

#[derive(Parser)]
#[command(name = "label-sync")]
#[command(about = "Propagate labels from a canonical repository to every repository in an organization")]
#[command(version)]
struct Cli {
    /// Organization that owns the source and target repositories
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Canonical repository name
    #[arg(long, global = true)]
    source_repo: Option<String>,

    /// Maximum number of repositories to enumerate
    #[arg(long, global = true)]
    max_repos: Option<usize>,

    /// Number of target repositories reconciled at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Repository names to skip (repeatable)
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Decide outcomes and log intended writes without issuing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propagate one label event to every target repository
    Event {
        /// Path to the label event payload (JSON)
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        payload: PathBuf,
    },

    /// Re-apply every source label to every target repository
    Resync,

    /// Run the webhook receiver
    Serve {
        /// Listen port (defaults to `LABEL_SYNC_PORT` or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = resolve_config(&cli);
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Event { payload } => run_event(&config, &payload).await,
        Commands::Resync => run_resync(&config).await,
        Commands::Serve { port } => run_serve(&config, port).await,
    }
}

/// Environment defaults overridden by command-line flags.
fn resolve_config(cli: &Cli) -> Config {
    let mut config = Config::default();
    if let Some(owner) = &cli.owner {
        config.owner = Some(owner.clone());
    }
    if let Some(source_repo) = &cli.source_repo {
        config.source_repo = Some(source_repo.clone());
    }
    if let Some(max_repos) = cli.max_repos {
        config.max_repos = max_repos;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.exclude.extend(cli.exclude.iter().cloned());
    config.dry_run |= cli.dry_run;
    config
}

fn build_client(config: &Config) -> Result<Arc<GitHubClient>> {
    let token = config
        .github_token
        .as_deref()
        .context("GITHUB_TOKEN is not set")?;
    let client = GitHubClient::with_base_url(token, &config.api_url)
        .context("Failed to create GitHub client")?;
    Ok(Arc::new(client))
}

fn build_enumerator(
    config: &Config,
    client: &Arc<GitHubClient>,
) -> Result<RepositoryEnumerator<GitHubClient>> {
    let source = config.source()?;
    let enumerator = config.exclude.iter().fold(
        RepositoryEnumerator::new(Arc::clone(client), &source.owner, config.max_repos)
            .exclude(&source.name),
        |enumerator, name| enumerator.exclude(name),
    );
    Ok(enumerator)
}

fn build_driver(config: &Config) -> Result<FanOutDriver<GitHubClient, GitHubClient>> {
    let client = build_client(config)?;
    let reconciler = Reconciler::new(Arc::clone(&client)).with_dry_run(config.dry_run);
    let enumerator = build_enumerator(config, &client)?;
    Ok(FanOutDriver::new(reconciler, enumerator).with_concurrency(config.concurrency))
}

async fn run_event(config: &Config, payload: &Path) -> Result<()> {
    let body = tokio::fs::read(payload)
        .await
        .with_context(|| format!("Failed to read event payload {}", payload.display()))?;
    let event = LabelEvent::from_slice(&body)?;

    let source = config.source()?;
    if let Some(origin) = event.foreign_origin(&source) {
        info!(origin = %origin, source = %source, "Ignoring label event from non-source repository");
        return Ok(());
    }

    let report = build_driver(config)?.run_event(&event).await?;

    for (repo, e) in report.failures() {
        error!(repo = %repo, error = %e, "Target failed");
    }
    info!(
        outcomes = %report.tally(),
        failed = report.failure_count(),
        dry_run = config.dry_run,
        "Label event processed"
    );

    if !report.is_success() {
        bail!(
            "{} of {} target repositories failed",
            report.failure_count(),
            report.results.len() + report.worker_failures.len()
        );
    }
    Ok(())
}

async fn run_resync(config: &Config) -> Result<()> {
    let client = build_client(config)?;
    let reconciler = Reconciler::new(Arc::clone(&client)).with_dry_run(config.dry_run);
    let enumerator = build_enumerator(config, &client)?;
    let resync = BulkResync::new(client, reconciler, enumerator, config.source()?);

    let report = resync.run().await.context("Bulk resync failed")?;
    info!(
        labels = report.labels,
        targets = report.targets,
        outcomes = %report.outcomes,
        dry_run = config.dry_run,
        "Bulk resync finished"
    );
    Ok(())
}

async fn run_serve(config: &Config, port: Option<u16>) -> Result<()> {
    if config.webhook_secret.is_none() {
        info!("No LABEL_SYNC_WEBHOOK_SECRET configured - webhook signatures will not be checked");
    }

    let state = AppState {
        source: config.source()?,
        webhook_secret: config.webhook_secret.clone(),
        driver: Arc::new(build_driver(config)?),
    };

    server::serve(state, port.unwrap_or(config.port)).await
}
