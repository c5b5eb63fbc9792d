//! JSONL report of every generation in a comparison run.

use crate::models::{ComparisonRecord, PrefbenchError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends [`ComparisonRecord`]s to a file, one JSON object per line.
pub struct ReportWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl ReportWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PrefbenchError::io(format!("opening report {}", path.display()), e))?;

        Ok(Self {
            path: path.to_owned(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one record and flush, so an interrupted run keeps what it has.
    pub fn record(&mut self, record: &ComparisonRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| PrefbenchError::Internal(format!("Failed to serialize record: {e}")))?;

        writeln!(self.writer, "{json}").map_err(|e| PrefbenchError::io("writing report", e))?;
        self.writer
            .flush()
            .map_err(|e| PrefbenchError::io("flushing report", e))?;

        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this writer.
    pub fn written(&self) -> usize {
        self.written
    }
}
