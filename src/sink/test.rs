use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use arrayvec::ArrayVec;
use uuid::Uuid;

use super::{discard, path_for, Row, RowReader, RowSink, DEFAULT_FILE};
use crate::error::Error;
use crate::event::Catalog;
use crate::monitor::Sample;

struct TempPath(PathBuf);

impl TempPath {
    fn new() -> Self {
        let name = format!("pmc-monitor-{}.csv", Uuid::new_v4());
        Self(std::env::temp_dir().join(name))
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn sample(elapsed_ms: u64, counts: &[u64]) -> Sample {
    Sample {
        elapsed_ms,
        counts: counts.iter().copied().collect::<ArrayVec<_, 8>>(),
    }
}

fn append_raw(path: &PathBuf, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

#[test]
fn test_path_for() {
    assert_eq!(path_for(None), PathBuf::from(DEFAULT_FILE));
    assert_eq!(path_for(Some("run1")), PathBuf::from("run1.csv"));
}

#[test]
fn test_header_and_rows() {
    let path = TempPath::new();
    let catalog = Catalog::reference();
    let mut sink = RowSink::create(&path.0, &catalog).unwrap();
    sink.append(&sample(1, &[1, 2, 3, 4, 5])).unwrap();
    sink.append(&sample(2, &[0, 0, 0, 0, 0])).unwrap();
    sink.close().unwrap();

    let text = fs::read_to_string(&path.0).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], catalog.header());
    assert_eq!(lines[1], "1,1,2,3,4,5");
    assert_eq!(lines[2], "2,0,0,0,0,0");
    assert!(text.ends_with('\n'));
}

#[test]
fn test_create_truncates() {
    let path = TempPath::new();
    fs::write(&path.0, "stale contents\n1,2,3\n").unwrap();
    let catalog = Catalog::reference();
    let mut sink = RowSink::create(&path.0, &catalog).unwrap();
    sink.close().unwrap();
    assert_eq!(
        fs::read_to_string(&path.0).unwrap(),
        format!("{}\n", catalog.header())
    );
}

#[test]
fn test_create_unavailable() {
    let path = std::env::temp_dir()
        .join(Uuid::new_v4().to_string())
        .join("sink.csv");
    let err = RowSink::create(&path, &Catalog::reference()).err().unwrap();
    assert!(matches!(err, Error::SinkUnavailable { .. }));
}

#[test]
fn test_append_after_close() {
    let path = TempPath::new();
    let mut sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    sink.close().unwrap();
    sink.close().unwrap();
    assert!(matches!(
        sink.append(&sample(1, &[1, 2, 3, 4, 5])),
        Err(Error::SinkWrite(_))
    ));
}

#[test]
fn test_append_wrong_width() {
    let path = TempPath::new();
    let mut sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    assert!(sink.append(&sample(1, &[1, 2])).is_err());
}

#[test]
fn test_reader_header_only() {
    let path = TempPath::new();
    let catalog = Catalog::reference();
    let _sink = RowSink::create(&path.0, &catalog).unwrap();

    let mut reader = RowReader::open(&path.0).unwrap();
    assert_eq!(
        reader.columns(),
        catalog.columns().map(String::from).collect::<Vec<_>>()
    );
    assert_eq!(reader.latest().unwrap(), None);
}

#[test]
fn test_reader_latest() {
    let path = TempPath::new();
    let mut sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    let mut reader = RowReader::open(&path.0).unwrap();

    sink.append(&sample(1, &[1, 2, 3, 4, 5])).unwrap();
    assert_eq!(
        reader.latest().unwrap(),
        Some(Row {
            elapsed_ms: 1,
            counts: vec![1, 2, 3, 4, 5]
        })
    );

    sink.append(&sample(2, &[6, 7, 8, 9, 10])).unwrap();
    assert_eq!(reader.latest().unwrap().unwrap().elapsed_ms, 2);
}

#[test]
fn test_reader_skips_partial_line() {
    let path = TempPath::new();
    let _sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    let mut reader = RowReader::open(&path.0).unwrap();

    append_raw(&path.0, "1,1,1");
    assert_eq!(reader.latest().unwrap(), None);

    append_raw(&path.0, ",1,1,1\n2,2,2,2,2,2\n");
    append_raw(&path.0, "3,3,3,");
    assert_eq!(reader.latest().unwrap().unwrap().elapsed_ms, 2);
}

#[test]
fn test_reader_malformed_row() {
    let path = TempPath::new();
    let _sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    let mut reader = RowReader::open(&path.0).unwrap();

    append_raw(&path.0, "1,2,3\n");
    assert!(matches!(
        reader.latest(),
        Err(Error::StaleOrMalformedRow(_))
    ));

    append_raw(&path.0, "2,a,b,c,d,e\n");
    assert!(matches!(
        reader.latest(),
        Err(Error::StaleOrMalformedRow(_))
    ));
}

#[test]
fn test_reader_long_file() {
    let path = TempPath::new();
    let mut sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    for i in 0..2000 {
        sink.append(&sample(i, &[i, i + 1, u64::MAX, 0, 42])).unwrap();
    }
    let mut reader = RowReader::open(&path.0).unwrap();
    assert_eq!(
        reader.latest().unwrap(),
        Some(Row {
            elapsed_ms: 1999,
            counts: vec![1999, 2000, u64::MAX, 0, 42]
        })
    );
}

#[test]
fn test_reader_missing_or_incomplete_header() {
    let path = TempPath::new();
    assert!(matches!(
        RowReader::open(&path.0),
        Err(Error::SinkUnavailable { .. })
    ));

    fs::write(&path.0, "Timestamp(ms),L1 DTLB").unwrap();
    assert!(matches!(
        RowReader::open(&path.0),
        Err(Error::StaleOrMalformedRow(_))
    ));

    fs::write(&path.0, "Time,a,b\n").unwrap();
    assert!(matches!(
        RowReader::open(&path.0),
        Err(Error::StaleOrMalformedRow(_))
    ));
}

#[test]
fn test_discard() {
    let path = TempPath::new();
    assert!(!discard(&path.0).unwrap());

    let mut sink = RowSink::create(&path.0, &Catalog::reference()).unwrap();
    sink.append(&sample(99000, &[9, 9, 9, 9, 9])).unwrap();
    sink.close().unwrap();
    assert!(discard(&path.0).unwrap());
    assert!(!path.0.exists());
    assert!(matches!(
        RowReader::open(&path.0),
        Err(Error::SinkUnavailable { .. })
    ));
}
