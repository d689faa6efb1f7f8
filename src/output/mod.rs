//! Output module for crawl reports
//!
//! This module handles:
//! - Collecting per-run crawl statistics
//! - Rendering the end-of-run report

pub mod stats;

pub use stats::{format_report, print_report, CrawlReport};
