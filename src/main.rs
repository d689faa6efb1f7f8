//! Tousu-Crawler main entry point
//!
//! This is the command-line interface for the complaint list crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tousu_crawler::config::{load_config_with_hash, validate, Config};
use tousu_crawler::crawler::crawl;
use tousu_crawler::output::print_report;
use tousu_crawler::url::PageUrlTemplate;
use tracing_subscriber::EnvFilter;

/// Tousu-Crawler: a resumable complaint list crawler
///
/// Walks the paginated complaint listing from a start page, appending every
/// complaint row to a CSV file. Interrupt with Ctrl-C at any time and resume
/// later with --start-page.
#[derive(Parser, Debug)]
#[command(name = "tousu-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A resumable complaint list crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults if omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Page number to start (or resume) from
    #[arg(short, long, value_name = "PAGE")]
    start_page: Option<u32>,

    /// Last page to crawl
    #[arg(short = 'l', long, value_name = "PAGE")]
    page_limit: Option<u32>,

    /// CSV file to append records to
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// CSV file to log skipped pages to
    #[arg(long, value_name = "FILE")]
    skipped_output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration after command-line overrides")?;

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tousu_crawler=info,warn"),
            1 => EnvFilter::new("tousu_crawler=debug,info"),
            2 => EnvFilter::new("tousu_crawler=trace,debug"),
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

/// Applies command-line flags on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(start_page) = cli.start_page {
        config.crawler.start_page = start_page;
    }
    if let Some(page_limit) = cli.page_limit {
        config.crawler.page_limit = Some(page_limit);
    }
    if let Some(output) = &cli.output {
        config.output.csv_path = output.display().to_string();
    }
    if let Some(skipped) = &cli.skipped_output {
        config.output.skipped_pages_path = Some(skipped.display().to_string());
    }
}

/// Handles the --dry-run mode: shows the effective settings and first URL
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let template = PageUrlTemplate::new(&config.request.list_url)?;

    println!("=== Tousu-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start page: {}", config.crawler.start_page);
    match config.crawler.page_limit {
        Some(limit) => println!("  Page limit: {}", limit),
        None => println!("  Page limit: none (stop at last page)"),
    }
    println!(
        "  Max attempts per page: {}",
        config.crawler.max_retries_per_page
    );
    println!(
        "  Retry backoff: {:.1}s - {:.1}s",
        config.crawler.retry_backoff.min_secs, config.crawler.retry_backoff.max_secs
    );
    println!(
        "  Inter-page delay: {:.1}s - {:.1}s",
        config.crawler.inter_page_delay.min_secs, config.crawler.inter_page_delay.max_secs
    );
    println!(
        "  Minimum valid response: {} bytes",
        config.crawler.min_valid_response_bytes
    );
    println!(
        "  Fallback total pages: {}",
        config.crawler.fallback_total_pages
    );

    println!("\nRequest:");
    println!("  List URL: {}", config.request.list_url);
    println!("  Timeout: {}s", config.request.timeout_secs);
    println!("  User agent: {}", config.request.user_agent);
    println!(
        "  Cookie: {}",
        if config.request.cookie.is_empty() {
            "not set"
        } else {
            "set"
        }
    );
    println!("  Extra headers ({}):", config.request.headers.len());
    for (name, value) in &config.request.headers {
        println!("    {}: {}", name, value);
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    if let Some(path) = &config.output.skipped_pages_path {
        println!("  Skipped pages: {}", path);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling at {}",
        template.page_url(config.crawler.start_page)
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Writing records to {}",
        config.output.csv_path
    );

    match crawl(config).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e).context("crawl aborted")
        }
    }
}
