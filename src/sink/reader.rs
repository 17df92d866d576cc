use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use super::Row;
use crate::error::{Error, Result};
use crate::event::TIMESTAMP_COLUMN;

// A row holds at most `MAX_EVENTS + 1` integers, far below this.
const TAIL_LEN: u64 = 4096;

/// Read-only view of a sink that another process is appending to.
pub struct RowReader {
    path: PathBuf,
    file: File,
    header_len: u64,
    columns: Vec<String>,
    tail: Vec<u8>,
}

impl RowReader {
    /// Open the sink and parse its header.
    ///
    /// Fails with `StaleOrMalformedRow` while the header is not completely
    /// written yet, callers retry later.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::SinkUnavailable {
            path: path.clone(),
            source,
        })?;

        let mut header = String::new();
        BufReader::new(&file)
            .read_line(&mut header)
            .map_err(|e| Error::StaleOrMalformedRow(format!("unreadable header: {}", e)))?;
        if !header.ends_with('\n') {
            return Err(Error::StaleOrMalformedRow("incomplete header".into()));
        }

        let mut fields = header.trim_end_matches(['\n', '\r']).split(',');
        if fields.next() != Some(TIMESTAMP_COLUMN) {
            return Err(Error::StaleOrMalformedRow(format!(
                "header does not start with {:?}",
                TIMESTAMP_COLUMN
            )));
        }
        let columns: Vec<String> = fields.map(String::from).collect();

        Ok(Self {
            path,
            file,
            header_len: header.len() as _,
            columns,
            tail: Vec::with_capacity(TAIL_LEN as _),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count column names in row order, excluding the timestamp.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The last complete row.
    ///
    /// Returns `Ok(None)` if no row has been written yet. A trailing line
    /// without its newline is still being appended and is skipped.
    pub fn latest(&mut self) -> Result<Option<Row>> {
        let len = self
            .file
            .metadata()
            .map_err(|e| Error::StaleOrMalformedRow(format!("cannot stat sink: {}", e)))?
            .len();
        if len <= self.header_len {
            return Ok(None);
        }

        let start = len.saturating_sub(TAIL_LEN).max(self.header_len);
        self.tail.resize((len - start) as _, 0);
        let n = read_full_at(&self.file, &mut self.tail, start)
            .map_err(|e| Error::StaleOrMalformedRow(format!("cannot read sink: {}", e)))?;
        let tail = &self.tail[..n];

        let Some(end) = tail.iter().rposition(|&b| b == b'\n') else {
            if start == self.header_len {
                // Only a partial first row so far.
                return Ok(None);
            }
            return Err(Error::StaleOrMalformedRow("no line end in tail".into()));
        };
        let line_start = match tail[..end].iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            None if start == self.header_len => 0,
            None => return Err(Error::StaleOrMalformedRow("row longer than tail".into())),
        };

        let line = std::str::from_utf8(&tail[line_start..end])
            .map_err(|_| Error::StaleOrMalformedRow("row is not utf-8".into()))?;
        parse_row(line, self.columns.len()).map(Some)
    }
}

/// Parse one row line with `columns` count fields after the timestamp.
pub fn parse_row(line: &str, columns: usize) -> Result<Row> {
    let malformed = || Error::StaleOrMalformedRow(format!("{:?}", line));

    let mut fields = line.trim_end_matches('\r').split(',');
    let elapsed_ms = fields
        .next()
        .and_then(|it| it.parse().ok())
        .ok_or_else(malformed)?;
    let counts = fields
        .map(|it| it.parse::<u64>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>>>()?;
    if counts.len() != columns {
        return Err(malformed());
    }

    Ok(Row { elapsed_ms, counts })
}

fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
