//! pool-crawler main entry point
//!
//! This is the command-line interface for the pool-crawler crawl engine.

use anyhow::Context;
use clap::Parser;
use pool_crawler::config::{load_config_with_hash, validate, validate_seed_url, Config};
use pool_crawler::crawler::http_engine;
use pool_crawler::output::{print_summary, CrawlSummary};
use pool_crawler::storage::open_state_store;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// pool-crawler: a concurrent, resumable web crawler
///
/// Crawls outward from a seed URL with a bounded pool of workers, visiting
/// every URL at most once and stopping at the configured depth. Visited URLs
/// are checkpointed to a state file so an interrupted crawl can resume.
#[derive(Parser, Debug)]
#[command(name = "pool-crawler")]
#[command(version)]
#[command(about = "A concurrent, resumable web crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "SEED", default_value = "http://books.toscrape.com")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of workers (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum crawl depth (overrides config)
    #[arg(short = 'd', long)]
    max_depth: Option<u32>,

    /// State file path (overrides config)
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Resize the worker pool to this many workers before seeding
    #[arg(long, value_name = "N")]
    resize_to: Option<usize>,

    /// Start a fresh crawl, ignoring previously visited URLs
    #[arg(long)]
    fresh: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_effective_config(&cli)?;
    validate_seed_url(&cli.seed)?;

    handle_crawl(config, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pool_crawler=info,warn"),
            1 => EnvFilter::new("pool_crawler=debug,info"),
            2 => EnvFilter::new("pool_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(workers) = cli.workers {
        config.crawler.worker_count = workers;
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
    if let Some(state) = &cli.state {
        config.state.path = state.clone();
    }

    validate(&config)?;
    Ok(config)
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let store = open_state_store(&config.state.path);
    if cli.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        match store.snapshot_info() {
            Ok(Some(info)) => tracing::info!(
                "Resuming from {} ({} URLs saved at {})",
                store.path().display(),
                info.url_count,
                info.saved_at
            ),
            Ok(None) => tracing::info!("No state file at {}", store.path().display()),
            Err(e) => tracing::warn!("State file {} unreadable: {}", store.path().display(), e),
        }
    }

    tracing::info!(
        "Workers: {}, max depth: {}, politeness delay: {}ms",
        config.crawler.worker_count,
        config.crawler.max_depth,
        config.crawler.politeness_delay_ms
    );

    let engine = http_engine(&config, cli.fresh)?;

    if let Some(n) = cli.resize_to {
        engine.resize(n)?;
    }

    tracing::info!("Seeding crawl with {}", cli.seed);
    let admission = engine.seed(&cli.seed);
    if !admission.is_admitted() {
        tracing::info!("Seed {} not crawled: {:?}", cli.seed, admission);
    }

    tokio::select! {
        _ = engine.wait_idle() => {
            tracing::info!("Crawl queue drained");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Interrupted, shutting down"),
                Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    }

    let summary = engine.shutdown(config.crawler.shutdown_timeout()).await;
    report_summary(&summary, &config.state.path);
    Ok(())
}

/// Prints the run summary; a failed final save is reported but not fatal
fn report_summary(summary: &CrawlSummary, state_path: &Path) {
    print_summary(summary);

    if !summary.persisted {
        tracing::warn!(
            "Visited URLs were not saved to {}; the next run will start from the last checkpoint",
            state_path.display()
        );
    }
}
