//! Crawler module for list page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with block detection
//! - HTML parsing of the complaint table and pager
//! - Retry policy and randomized request pacing
//! - The page loop that ties them together

mod controller;
mod fetcher;
mod pacing;
mod parser;

pub use controller::{run_crawl, CrawlController};
pub use fetcher::{
    build_http_client, charset_from_content_type, check_body_size, BlockReason, FetchError,
    HttpFetcher, PageFetcher, RawPage,
};
pub use pacing::{DelayKind, DelayRange, Pacer, PauseOutcome, RetryPolicy, Sleeper, TokioSleeper};
pub use parser::{
    clean_text, extract_issue, parse_html, parse_page, split_issue_text, IssueExtraction,
    IssueFields, PageResult, ISSUE_SEPARATOR, MIN_COLUMNS,
};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::TousuError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the CSV output (writing the header only for a new file)
/// 2. Build the HTTP client with the configured request profile
/// 3. Walk the list pages from the start page, retrying failed fetches
/// 4. Stop at the last page, the page limit, or on Ctrl-C
///
/// Unlike [`run_crawl`], this installs its own Ctrl-C handler.
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed or was interrupted
/// * `Err(TousuError)` - Crawl failed
pub async fn crawl(config: Config) -> Result<CrawlReport, TousuError> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    let handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current step and shutting down");
            on_interrupt.cancel();
        }
    });

    let result = run_crawl(&config, cancel).await;
    handler.abort();
    result
}
