//! Append-only csv table shared by the collector (sole writer) and the
//! consumer (read-only poller).
//!
//! The header is `Timestamp(ms),<column_1>,...,<column_N>` and every row is
//! `<elapsed_ms>,<count_1>,...,<count_N>`. Each row reaches the file in a
//! single write, so a reader sees complete rows plus at most one trailing
//! partial line.

#[cfg(test)]
mod test;

mod reader;

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
pub use reader::*;

use crate::error::{Error, Result};
use crate::event::Catalog;
use crate::monitor::Sample;

/// Default sink file name when no base name is given.
pub const DEFAULT_FILE: &str = "kaslrtp_monitor.csv";

/// Sink path for an optional base name: `<name>.csv`, or [`DEFAULT_FILE`].
pub fn path_for(name: Option<&str>) -> PathBuf {
    match name {
        Some(name) => PathBuf::from(format!("{}.csv", name)),
        None => PathBuf::from(DEFAULT_FILE),
    }
}

/// Remove a sink left behind by an earlier run. Returns whether there was
/// one.
///
/// The collector truncates the sink only after every counter is open, and
/// until then a reader would find the previous run's rows.
pub fn discard(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed previous sink {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A parsed data row.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    pub elapsed_ms: u64,
    pub counts: Vec<u64>,
}

/// Writer end of the sink.
pub struct RowSink {
    path: PathBuf,
    // Unbuffered on purpose: one `write_all` per row is one `write(2)`.
    file: Option<File>,
    columns: usize,
    line: String,
}

impl RowSink {
    /// Create or truncate the sink and write the header for `catalog`.
    pub fn create(path: impl AsRef<Path>, catalog: &Catalog) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source| Error::SinkUnavailable {
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).map_err(unavailable)?;
        let mut header = catalog.header();
        header.push('\n');
        file.write_all(header.as_bytes()).map_err(unavailable)?;
        file.flush().map_err(unavailable)?;
        debug!("Created row sink {}", path.display());

        Ok(Self {
            path,
            file: Some(file),
            columns: catalog.len(),
            line: String::with_capacity(header.len()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `sample` as one row.
    pub fn append(&mut self, sample: &Sample) -> Result<()> {
        if sample.counts.len() != self.columns {
            return Err(Error::SinkWrite(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "sample has {} counts, sink has {} columns",
                    sample.counts.len(),
                    self.columns
                ),
            )));
        }
        let Some(file) = self.file.as_mut() else {
            return Err(Error::SinkWrite(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "row sink is closed",
            )));
        };

        self.line.clear();
        // Writing into a `String` cannot fail.
        let _ = write!(self.line, "{}", sample.elapsed_ms);
        for count in &sample.counts {
            let _ = write!(self.line, ",{}", count);
        }
        self.line.push('\n');

        file.write_all(self.line.as_bytes()).map_err(Error::SinkWrite)?;
        file.flush().map_err(Error::SinkWrite)
    }

    /// Flush and close the file, later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(Error::SinkWrite)?;
            debug!("Closed row sink {}", self.path.display());
        }
        Ok(())
    }
}
