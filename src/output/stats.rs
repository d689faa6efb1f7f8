//! Statistics gathered over one crawl run
//!
//! The controller fills a `CrawlReport` as it goes; the binary prints it once
//! the run has ended.

use crate::state::Termination;
use crate::storage::SkippedPage;
use std::fmt::Write as _;
use std::time::Duration;

/// Summary of a finished crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Page the run started at
    pub start_page: u32,

    /// Pages whose records were written, in crawl order
    pub pages_crawled: Vec<u32>,

    /// Pages given up on after exhausting their retries
    pub pages_skipped: Vec<SkippedPage>,

    /// Rows appended to the CSV during this run
    pub records_written: u64,

    /// Fetch attempts that failed, including ones later retried successfully
    pub failed_attempts: u32,

    /// Total page count adopted during the run
    pub total_pages: Option<u32>,

    /// Effective last page to visit
    pub upper_bound: Option<u32>,

    /// Why the run stopped; `None` if it aborted on an error
    pub termination: Option<Termination>,

    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn new(start_page: u32) -> Self {
        Self {
            start_page,
            ..Self::default()
        }
    }

    /// Last page that was fetched successfully
    pub fn last_page(&self) -> Option<u32> {
        self.pages_crawled.last().copied()
    }

    /// Page a follow-up run should start at to continue this one
    ///
    /// Returns `None` when the run reached the end of the listing.
    pub fn resume_page(&self) -> Option<u32> {
        match self.termination {
            Some(Termination::NoNextPage) | Some(Termination::AtLimit { .. }) => None,
            _ => {
                let last_visited = self
                    .last_page()
                    .into_iter()
                    .chain(self.pages_skipped.iter().map(|s| s.page))
                    .max();
                Some(last_visited.map_or(self.start_page, |page| page + 1))
            }
        }
    }

    pub fn skipped_page_numbers(&self) -> Vec<u32> {
        self.pages_skipped.iter().map(|s| s.page).collect()
    }
}

/// Renders the report as plain text
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Report ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Start page: {}", report.start_page);
    match report.last_page() {
        Some(page) => {
            let _ = writeln!(out, "  Last page crawled: {}", page);
        }
        None => {
            let _ = writeln!(out, "  Last page crawled: none");
        }
    }
    let _ = writeln!(out, "  Pages crawled: {}", report.pages_crawled.len());
    let _ = writeln!(out, "  Records written: {}", report.records_written);
    let _ = writeln!(out, "  Failed attempts: {}", report.failed_attempts);
    if let Some(total) = report.total_pages {
        let _ = writeln!(out, "  Total pages detected: {}", total);
    }
    if let Some(bound) = report.upper_bound {
        let _ = writeln!(out, "  Upper bound: {}", bound);
    }
    let _ = writeln!(out, "  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    let _ = writeln!(out);

    if !report.pages_skipped.is_empty() {
        let _ = writeln!(out, "Skipped Pages ({}):", report.pages_skipped.len());
        for skipped in &report.pages_skipped {
            let _ = writeln!(out, "  - page {}: {}", skipped.page, skipped.reason);
        }
        let _ = writeln!(out);
    }

    match report.termination {
        Some(termination) => {
            let _ = writeln!(out, "Stopped: {}", termination);
        }
        None => {
            let _ = writeln!(out, "Stopped: aborted");
        }
    }

    if let Some(page) = report.resume_page() {
        let _ = writeln!(out, "Resume with: --start-page {}", page);
    }

    out
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
