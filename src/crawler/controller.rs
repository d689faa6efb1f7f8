//! Crawl controller - main crawl orchestration logic
//!
//! This module contains the page loop that drives a crawl run:
//! - Building each page URL from the cursor
//! - Fetching with bounded retries and randomized backoff
//! - Parsing, persisting, and advancing the cursor
//! - Deciding termination and handling cancellation
//! - Closing every output on every exit path

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{FetchError, HttpFetcher, PageFetcher, RawPage};
use crate::crawler::pacing::{DelayKind, Pacer, PauseOutcome, RetryPolicy, TokioSleeper};
use crate::crawler::parser::{parse_page, PageResult};
use crate::output::CrawlReport;
use crate::state::{CrawlCursor, CycleState, Termination};
use crate::storage::{CsvSink, RecordSink, SkippedPage, SkippedPageLog};
use crate::url::PageUrlTemplate;
use crate::TousuError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of trying to fetch one page
enum FetchOutcome {
    /// A usable page body
    Fetched(RawPage),

    /// Every attempt failed; carries the last error
    Exhausted(FetchError),

    /// Cancellation arrived before a page was obtained
    Cancelled,
}

/// Main crawl controller
///
/// Owns the cursor and the sink for the whole run. Pages are processed
/// strictly one after another.
pub struct CrawlController<F, S> {
    fetcher: F,
    sink: S,
    skip_log: Option<SkippedPageLog>,
    pacer: Pacer,
    retry_policy: RetryPolicy,
    template: PageUrlTemplate,
    cursor: CrawlCursor,
    fallback_total_pages: u32,
    cancel: CancellationToken,
    state: CycleState,
    report: CrawlReport,
}

impl<F, S> CrawlController<F, S>
where
    F: PageFetcher,
    S: RecordSink,
{
    /// Creates a new controller
    ///
    /// # Arguments
    ///
    /// * `config` - Crawl loop settings (start page, limit, retries, fallback)
    /// * `template` - List page URL template
    /// * `fetcher` - Performs single fetch attempts
    /// * `sink` - Destination for parsed records
    /// * `pacer` - Draws and sleeps the backoff and inter-page delays
    /// * `cancel` - Token observed at every suspension point
    pub fn new(
        config: &CrawlerConfig,
        template: PageUrlTemplate,
        fetcher: F,
        sink: S,
        pacer: Pacer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            sink,
            skip_log: None,
            pacer,
            retry_policy: RetryPolicy::new(config.max_retries_per_page),
            template,
            cursor: CrawlCursor::new(
                config.start_page,
                config.page_limit,
                config.fallback_total_pages,
            ),
            fallback_total_pages: config.fallback_total_pages,
            cancel,
            state: CycleState::Idle,
            report: CrawlReport::new(config.start_page),
        }
    }

    /// Records skipped pages to the given log as well as to the report
    pub fn with_skip_log(mut self, skip_log: SkippedPageLog) -> Self {
        self.skip_log = Some(skip_log);
        self
    }

    pub fn cursor(&self) -> &CrawlCursor {
        &self.cursor
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs the page loop until a termination condition fires
    ///
    /// Outputs are closed on every exit path. A persistence failure aborts
    /// the run after that final close has been attempted.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run ended normally or was cancelled
    /// * `Err(TousuError)` - Records could not be persisted
    pub async fn run(&mut self) -> Result<CrawlReport, TousuError> {
        // A controller drives exactly one run
        if self.state.is_terminal() {
            return Err(TousuError::InvalidTransition {
                from: self.state,
                to: CycleState::Fetching,
            });
        }

        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl at page {}{}",
            self.cursor.current_page(),
            self.cursor
                .page_limit()
                .map(|limit| format!(" (page limit {})", limit))
                .unwrap_or_default()
        );

        let outcome = self.drive().await;
        let closed = self.close_outputs();

        self.report.elapsed = start_time.elapsed();
        self.report.records_written = self.sink.rows_written();
        self.report.total_pages = self.cursor.total_pages();
        self.report.upper_bound = Some(self.cursor.upper_bound());

        let termination = match outcome {
            Ok(termination) => termination,
            Err(e) => {
                tracing::error!("Crawl aborted on page {}: {}", self.cursor.current_page(), e);
                if let Err(close_err) = closed {
                    tracing::error!("Closing outputs also failed: {}", close_err);
                }
                return Err(e);
            }
        };
        closed?;

        self.report.termination = Some(termination);
        tracing::info!(
            "Crawl finished: {} ({} pages crawled, {} skipped, {} records written)",
            termination,
            self.report.pages_crawled.len(),
            self.report.pages_skipped.len(),
            self.report.records_written
        );

        Ok(self.report.clone())
    }

    /// The page loop proper
    async fn drive(&mut self) -> Result<Termination, TousuError> {
        loop {
            if self.cancel.is_cancelled() {
                return self.terminate(Termination::Cancelled);
            }

            if let Some(upper_bound) = self.cursor.past_upper_bound() {
                return self.terminate(Termination::AtLimit { upper_bound });
            }

            let page = self.cursor.current_page();
            let url = self.template.page_url(page);
            tracing::info!("Crawling page {}: {}", page, url);

            match self.fetch_with_retries(page, &url).await? {
                FetchOutcome::Fetched(raw) => {
                    self.transition(CycleState::ParsedOk)?;
                    let result = parse_page(&raw);
                    self.adopt_total_pages(&result);

                    self.sink.append(&result.records)?;
                    self.transition(CycleState::Written)?;
                    self.report.pages_crawled.push(page);
                    tracing::info!(
                        "Page {} saved {} records{}",
                        page,
                        result.records.len(),
                        if result.skipped_rows > 0 {
                            format!(" ({} malformed rows skipped)", result.skipped_rows)
                        } else {
                            String::new()
                        }
                    );

                    if !result.has_next_page() {
                        tracing::info!("No next-page link on page {}, stopping", page);
                        return self.terminate(Termination::NoNextPage);
                    }
                }
                FetchOutcome::Exhausted(last_error) => {
                    self.transition(CycleState::Skipped)?;
                    self.skip_page(page, &url, &last_error)?;
                }
                FetchOutcome::Cancelled => {
                    return self.terminate(Termination::Cancelled);
                }
            }

            self.cursor.advance();
            self.transition(CycleState::Advanced)?;

            if let Some(upper_bound) = self.cursor.past_upper_bound() {
                tracing::info!(
                    "Reached upper bound of {} pages, stopping",
                    upper_bound
                );
                return self.terminate(Termination::AtLimit { upper_bound });
            }

            let delay = self.pacer.next_delay(DelayKind::InterPage);
            tracing::debug!("Waiting {:.1}s before page {}", delay.as_secs_f64(), self.cursor.current_page());
            if self.pacer.pause(delay, &self.cancel).await == PauseOutcome::Cancelled {
                return self.terminate(Termination::Cancelled);
            }
        }
    }

    /// Fetches one page, retrying failed attempts with backoff
    async fn fetch_with_retries(&mut self, page: u32, url: &Url) -> Result<FetchOutcome, TousuError> {
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempts = 0;

        loop {
            self.transition(CycleState::Fetching)?;
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.fetcher.fetch(url) => Some(result),
            };

            let error = match result {
                None => return Ok(FetchOutcome::Cancelled),
                Some(Ok(raw)) => return Ok(FetchOutcome::Fetched(raw)),
                Some(Err(e)) => e,
            };

            self.transition(CycleState::Failed)?;
            self.report.failed_attempts += 1;
            tracing::warn!(
                "Page {} failed (attempt {}/{}): {}",
                page,
                attempts,
                max_attempts,
                error
            );

            if !self.retry_policy.allows_retry(attempts) {
                return Ok(FetchOutcome::Exhausted(error));
            }

            self.transition(CycleState::Retrying)?;
            let delay = self.pacer.next_delay(DelayKind::RetryBackoff);
            tracing::info!(
                "Waiting {:.1}s before retrying page {}",
                delay.as_secs_f64(),
                page
            );
            if self.pacer.pause(delay, &self.cancel).await == PauseOutcome::Cancelled {
                return Ok(FetchOutcome::Cancelled);
            }
        }
    }

    /// Sets the total page count from the first successful page
    fn adopt_total_pages(&mut self, result: &PageResult) {
        if self.cursor.total_pages().is_some() {
            return;
        }

        match result.total_pages {
            Some(total) => {
                self.cursor.adopt_total_pages(total);
                tracing::info!("Detected {} total pages", total);
            }
            None => {
                self.cursor.adopt_total_pages(self.fallback_total_pages);
                tracing::warn!(
                    "Could not detect total pages, using fallback of {}",
                    self.fallback_total_pages
                );
            }
        }
    }

    /// Reports a page given up on after exhausting its retries
    fn skip_page(&mut self, page: u32, url: &Url, last_error: &FetchError) -> Result<(), TousuError> {
        tracing::warn!(
            "Page {} failed {} times, skipping: {}",
            page,
            self.retry_policy.max_attempts(),
            last_error
        );

        let skipped = SkippedPage {
            page,
            url: url.to_string(),
            reason: last_error.to_string(),
            skipped_at: Utc::now(),
        };

        if let Some(log) = self.skip_log.as_mut() {
            log.record(&skipped)?;
        }
        self.report.pages_skipped.push(skipped);
        Ok(())
    }

    /// Moves to a terminal state and returns its reason
    fn terminate(&mut self, termination: Termination) -> Result<Termination, TousuError> {
        self.transition(termination.state())?;
        Ok(termination)
    }

    /// Moves the page cycle to `next`, rejecting illegal transitions
    fn transition(&mut self, next: CycleState) -> Result<(), TousuError> {
        if !self.state.can_transition_to(next) {
            return Err(TousuError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!("Page {}: {} -> {}", self.cursor.current_page(), self.state, next);
        self.state = next;
        Ok(())
    }

    /// Closes the record sink and the skip log
    ///
    /// Both are attempted even if the first one fails; the first error wins.
    fn close_outputs(&mut self) -> Result<(), TousuError> {
        let sink_result = self.sink.close();
        let log_result = match self.skip_log.as_mut() {
            Some(log) => log.close(),
            None => Ok(()),
        };

        sink_result?;
        log_result?;
        tracing::info!("Output files closed");
        Ok(())
    }
}

/// Runs a complete crawl from configuration
///
/// Builds the HTTP fetcher, opens the CSV sink (and skip log, if configured)
/// and drives the controller until it terminates.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Token that stops the crawl gracefully when cancelled
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed or was cancelled
/// * `Err(TousuError)` - Crawl could not start or lost the ability to persist
///
/// # Example
///
/// ```no_run
/// use tousu_crawler::config::load_config;
/// use tousu_crawler::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let report = run_crawl(&config, CancellationToken::new()).await?;
/// println!("{} records written", report.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    cancel: CancellationToken,
) -> Result<CrawlReport, TousuError> {
    let template = PageUrlTemplate::new(&config.request.list_url)?;
    let fetcher = HttpFetcher::from_config(
        &config.request,
        config.crawler.min_valid_response_bytes,
    )?;
    let sink = CsvSink::open(Path::new(&config.output.csv_path))?;
    let pacer = Pacer::from_config(&config.crawler, Arc::new(TokioSleeper));

    let mut controller =
        CrawlController::new(&config.crawler, template, fetcher, sink, pacer, cancel);

    if let Some(path) = &config.output.skipped_pages_path {
        controller = controller.with_skip_log(SkippedPageLog::open(Path::new(path))?);
    }

    controller.run().await
}
