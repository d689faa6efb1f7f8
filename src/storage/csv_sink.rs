//! CSV-backed record sink

use crate::storage::traits::{RecordSink, SinkError, SinkResult};
use crate::storage::Record;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Append-only CSV file of complaint records
///
/// The file is opened in append mode. Whether it existed is checked once, at
/// open time, and decides whether the header row is written. Every row is
/// flushed on its own so the file can be tailed or recovered at any point.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    is_new: bool,
    header_checked: bool,
    rows_written: u64,
}

impl CsvSink {
    /// Opens (or creates) the CSV file and writes the header if it is new
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file; missing parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(CsvSink)` - Sink ready for appends
    /// * `Err(SinkError)` - The file could not be opened or the header written
    pub fn open(path: &Path) -> SinkResult<Self> {
        let existed = path.exists();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut sink = Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            is_new: !existed,
            header_checked: false,
            rows_written: 0,
        };

        if sink.write_header_if_new()? {
            tracing::info!("Created {} and wrote header row", path.display());
        } else {
            tracing::info!("Appending to existing {}", path.display());
        }

        Ok(sink)
    }

    /// Returns true if the file did not exist before this sink opened it
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    fn writer(&mut self) -> SinkResult<&mut csv::Writer<File>> {
        let path = &self.path;
        self.writer
            .as_mut()
            .ok_or_else(|| SinkError::Closed(path.display().to_string()))
    }
}

impl RecordSink for CsvSink {
    fn write_header_if_new(&mut self) -> SinkResult<bool> {
        if self.header_checked {
            return Ok(false);
        }
        self.header_checked = true;

        if !self.is_new {
            return Ok(false);
        }

        let writer = self.writer()?;
        writer.write_record(Record::HEADER)?;
        writer.flush()?;
        Ok(true)
    }

    fn append(&mut self, records: &[Record]) -> SinkResult<()> {
        let writer = self.writer()?;
        for record in records {
            writer.serialize(record)?;
            writer.flush()?;
        }
        self.rows_written += records.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::debug!(
                "Closed {} after {} rows",
                self.path.display(),
                self.rows_written
            );
        }
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}
