//! Record sink trait and error types
//!
//! This module defines the interface the crawl controller persists records
//! through, and the errors a sink can report.

use crate::storage::Record;
use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sink is already closed: {0}")]
    Closed(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Append-only destination for complaint records
///
/// Implementations must leave the destination readable after every call to
/// `append`: each record is a complete row by the time the call returns.
pub trait RecordSink {
    /// Writes the header row if the destination did not exist when opened
    ///
    /// Only the first call per sink can write anything.
    ///
    /// # Returns
    ///
    /// `true` if the header was written by this call
    fn write_header_if_new(&mut self) -> SinkResult<bool>;

    /// Appends records as rows, preserving their order
    fn append(&mut self, records: &[Record]) -> SinkResult<()>;

    /// Flushes and releases the destination
    ///
    /// Calling this more than once is a no-op.
    fn close(&mut self) -> SinkResult<()>;

    /// Number of rows appended since the sink was opened
    fn rows_written(&self) -> u64;
}
