//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep crawl controller.

use anyhow::Context;
use catalog_sweep::config::{load_config_with_hash, Config};
use catalog_sweep::crawler::{crawl, RunOutcome};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Sweep: a bounded, resumable catalog crawler
///
/// Catalog-Sweep walks the paginated listings of a catalog site, stops each
/// listing chain when it loops back onto items it has already seen, and
/// writes one record per item-detail page. An optional item limit holds
/// across restarts.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version)]
#[command(about = "A bounded, resumable catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, discarding the frontier and the item counter
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write the collected records to PATH as JSON lines and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("invalid config {}", cli.config.display()));
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Concurrency: {}..{}",
        config.crawler.min_concurrency, config.crawler.max_concurrency
    );
    println!("  Max request retries: {}", config.crawler.max_request_retries);
    println!(
        "  Page timeout: {}s",
        config.crawler.handle_page_timeout_secs
    );
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    match config.crawler.max_items {
        Some(max) => println!("  Max items: {}", max),
        None => println!("  Max items: unlimited"),
    }

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Item URL pattern: {}", config.site.item_url_pattern);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    if config.proxy.is_some() {
        println!("\nProxy: configured");
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nStart URLs ({}):", config.start_urls.len());
    for start in &config.start_urls {
        println!("  - {}", start.url);
    }

    if let Some(extension) = &config.extension {
        println!("\nExtension fields ({}):", extension.fields.len());
        for (name, rule) in &extension.fields {
            println!("  - {}: {}", name, rule.selector);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} start URLs",
        config.start_urls.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use catalog_sweep::output::{load_statistics, print_statistics};
    use catalog_sweep::storage::SqliteStorage;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes the dataset as JSON lines
fn handle_export(config: &Config, path: &Path) -> anyhow::Result<()> {
    use catalog_sweep::output::export_json_lines;
    use catalog_sweep::storage::SqliteStorage;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let written = export_json_lines(&storage, path)
        .with_context(|| format!("failed to export records to {}", path.display()))?;

    println!("✓ Exported {} records to: {}", written, path.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }

    tracing::info!("Total start URLs: {}", config.start_urls.len());

    match crawl(config, config_hash, fresh).await {
        Ok(RunOutcome::Completed) => {
            tracing::info!("Crawler finished.");
            Ok(())
        }
        Ok(RunOutcome::Suspended) => {
            tracing::info!("Crawl suspended; run again to resume");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
