//! Storage module for persisting crawl output
//!
//! This module handles everything the crawler writes to disk:
//! - The append-only complaint CSV (`CsvSink`)
//! - The optional log of skipped pages (`SkippedPageLog`)

mod csv_sink;
mod skip_log;
mod traits;

pub use csv_sink::CsvSink;
pub use skip_log::{SkippedPage, SkippedPageLog};
pub use traits::{RecordSink, SinkError, SinkResult};

use serde::{Deserialize, Serialize};

/// One complaint row extracted from a list page
///
/// All fields are already cleaned: trimmed, with embedded line breaks
/// collapsed to single spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub brand: String,
    pub series: String,
    pub model: String,
    pub summary: String,
    pub primary_issue: String,
    pub issue_subtype: String,
    pub date: String,
}

impl Record {
    /// Column names, in the order rows are written
    pub const HEADER: [&'static str; 8] = [
        "id",
        "brand",
        "series",
        "model",
        "summary",
        "primaryIssue",
        "issueSubtype",
        "date",
    ];
}
