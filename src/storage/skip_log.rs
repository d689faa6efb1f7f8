//! Log of pages abandoned after exhausting their retries
//!
//! Skipped pages are never retried within a run. Writing them to their own
//! CSV lets a later run target exactly the pages that are missing.

use crate::storage::traits::{SinkError, SinkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// One abandoned page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPage {
    pub page: u32,
    pub url: String,
    /// Error from the final attempt
    pub reason: String,
    pub skipped_at: DateTime<Utc>,
}

/// Append-only CSV of skipped pages
pub struct SkippedPageLog {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl SkippedPageLog {
    const HEADER: [&'static str; 4] = ["page", "url", "reason", "skipped_at"];

    /// Opens (or creates) the log, writing the header only for a new file
    pub fn open(path: &Path) -> SinkResult<Self> {
        let existed = path.exists();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !existed {
            writer.write_record(Self::HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }

    /// Appends one skipped page
    pub fn record(&mut self, skipped: &SkippedPage) -> SinkResult<()> {
        let path = &self.path;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::Closed(path.display().to_string()))?;

        writer.serialize(skipped)?;
        writer.flush()?;
        Ok(())
    }

    /// Flushes and releases the file; safe to call repeatedly
    pub fn close(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for SkippedPageLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}
