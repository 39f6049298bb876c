//! File — per-file scan state: one owned line reader, line counter, and
//! capture scratch, producing typed row batches.
//!
//! There is no intra-file parallelism; one reader owns one file and emits
//! rows in file order. `try_initialize_scan` succeeds exactly once, and
//! the reader transitions to finished exactly once, releasing its file
//! handle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ReadError;
use crate::extract::{extract_line, ColumnValue, ExtractScratch, Row};
use crate::format::ColumnType;
use crate::read::line_reader::LineReader;
use crate::read::{BoundFormat, ScanStats, BATCH_SIZE};

#[derive(Debug)]
pub struct FileReader<'a> {
    bound: &'a BoundFormat,
    path: PathBuf,
    log_file: String,
    reader: Option<LineReader>,
    line_buf: Vec<u8>,
    current_line_number: u64,
    scratch: Option<ExtractScratch>,
    scan_initialized: AtomicBool,
    finished: AtomicBool,
    stats: ScanStats,
}

impl<'a> FileReader<'a> {
    pub fn open(bound: &'a BoundFormat, path: &Path) -> Result<Self, ReadError> {
        let reader = LineReader::open(path)?;
        let scratch = bound.format.as_ref().map(ExtractScratch::new);
        Ok(Self {
            bound,
            path: path.to_path_buf(),
            log_file: path.display().to_string(),
            reader: Some(reader),
            line_buf: Vec::new(),
            current_line_number: 0,
            scratch,
            scan_initialized: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            stats: ScanStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Claim the scan for this file. Succeeds exactly once.
    pub fn try_initialize_scan(&self) -> bool {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.scan_initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn finish(&mut self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            self.stats.files_processed += 1;
            // Release the file handle.
            self.reader = None;
        }
    }

    /// Produce the next batch of rows, or `None` once the file is drained
    /// (or cancellation was observed at this batch boundary).
    pub fn next_batch(&mut self, cancel: &AtomicBool) -> Result<Option<Vec<Row>>, ReadError> {
        if self.is_finished() {
            return Ok(None);
        }
        if cancel.load(Ordering::Relaxed) {
            tracing::debug!(file = %self.log_file, "scan cancelled");
            self.finish();
            return Ok(None);
        }

        let mut rows: Vec<Row> = Vec::new();

        while rows.len() < BATCH_SIZE {
            let reader = self.reader.as_mut().expect("reader present until finished");
            if !reader.read_line(&mut self.line_buf)? {
                self.finish();
                break;
            }
            self.current_line_number += 1;

            if self.line_buf.is_empty() {
                continue;
            }
            self.stats.bytes_scanned += self.line_buf.len() as u64 + 1;

            let line = String::from_utf8_lossy(&self.line_buf).into_owned();
            match &self.bound.format {
                None => {
                    // Raw fallback: every line is a parse-error row.
                    self.stats.parse_errors += 1;
                    self.stats.total_rows += 1;
                    rows.push(self.error_row(&line));
                }
                Some(parsed) => {
                    let scratch = self.scratch.as_mut().expect("scratch built with format");
                    match extract_line(parsed, &line, self.bound.raw, scratch) {
                        Some(mut row) => {
                            row.push(ColumnValue::Text(self.log_file.clone()));
                            if self.bound.raw {
                                row.push(ColumnValue::Int64(self.current_line_number as i64));
                                row.push(ColumnValue::Bool(false));
                                row.push(ColumnValue::Null);
                            }
                            self.stats.total_rows += 1;
                            rows.push(row);
                        }
                        None => {
                            self.stats.parse_errors += 1;
                            if !self.bound.raw {
                                continue;
                            }
                            self.stats.total_rows += 1;
                            rows.push(self.error_row(&line));
                        }
                    }
                }
            }
        }

        if rows.is_empty() && self.is_finished() {
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }

    /// A raw-mode parse-error row: text data columns empty, other data
    /// columns null, then the metadata columns with the offending line.
    fn error_row(&self, line: &str) -> Row {
        let mut row = Row::with_capacity(self.bound.schema.len());
        for column in &self.bound.schema[..self.bound.data_columns] {
            row.push(match column.column_type {
                ColumnType::Text => ColumnValue::Text(String::new()),
                _ => ColumnValue::Null,
            });
        }
        row.push(ColumnValue::Text(self.log_file.clone()));
        row.push(ColumnValue::Int64(self.current_line_number as i64));
        row.push(ColumnValue::Bool(true));
        row.push(ColumnValue::Text(line.to_string()));
        row
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{compile, COMMON_FORMAT};
    use crate::read::bound_from;
    use crate::detect::DetectedFormat;
    use std::path::PathBuf;

    const GOOD: &str =
        r#"192.168.1.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /index.html HTTP/1.0" 200 2326"#;

    fn write_log(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn bound(raw: bool) -> BoundFormat {
        bound_from(compile(COMMON_FORMAT).unwrap(), DetectedFormat::Common, raw)
    }

    #[test]
    fn test_scan_initialized_exactly_once() {
        let path = write_log("httpdlog_test_init.log", GOOD);
        let bound = bound(false);
        let reader = FileReader::open(&bound, &path).unwrap();
        assert!(reader.try_initialize_scan());
        assert!(!reader.try_initialize_scan());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_batches_then_none() {
        let path = write_log(
            "httpdlog_test_batch.log",
            &format!("{GOOD}\n{GOOD}\n{GOOD}\n"),
        );
        let bound = bound(false);
        let mut reader = FileReader::open(&bound, &path).unwrap();
        let cancel = AtomicBool::new(false);

        let batch = reader.next_batch(&cancel).unwrap().unwrap();
        assert_eq!(batch.len(), 3);
        assert!(reader.next_batch(&cancel).unwrap().is_none());
        assert!(reader.is_finished());
        assert_eq!(reader.stats().total_rows, 3);
        assert_eq!(reader.stats().files_processed, 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_parse_errors_skipped_outside_raw_mode() {
        let path = write_log(
            "httpdlog_test_skip.log",
            &format!("{GOOD}\nnot a log line\n{GOOD}\n"),
        );
        let bound = bound(false);
        let mut reader = FileReader::open(&bound, &path).unwrap();
        let cancel = AtomicBool::new(false);

        let batch = reader.next_batch(&cancel).unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(reader.stats().parse_errors, 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_raw_mode_emits_error_rows() {
        let path = write_log(
            "httpdlog_test_raw.log",
            &format!("{GOOD}\nnot a log line\n"),
        );
        let bound = bound(true);
        let mut reader = FileReader::open(&bound, &path).unwrap();
        let cancel = AtomicBool::new(false);

        let batch = reader.next_batch(&cancel).unwrap().unwrap();
        assert_eq!(batch.len(), 2);

        let ok_row = &batch[0];
        let n = ok_row.len();
        assert_eq!(ok_row[n - 3], ColumnValue::Int64(1));
        assert_eq!(ok_row[n - 2], ColumnValue::Bool(false));
        assert_eq!(ok_row[n - 1], ColumnValue::Null);

        let err_row = &batch[1];
        assert_eq!(err_row[n - 3], ColumnValue::Int64(2));
        assert_eq!(err_row[n - 2], ColumnValue::Bool(true));
        assert_eq!(
            err_row[n - 1],
            ColumnValue::Text("not a log line".to_string())
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_lines_counted_but_not_emitted() {
        let path = write_log(
            "httpdlog_test_empty.log",
            &format!("{GOOD}\n\n\nnope\n"),
        );
        let bound = bound(true);
        let mut reader = FileReader::open(&bound, &path).unwrap();
        let cancel = AtomicBool::new(false);

        let batch = reader.next_batch(&cancel).unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        let n = batch[1].len();
        // The error row is on physical line 4.
        assert_eq!(batch[1][n - 3], ColumnValue::Int64(4));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_cancellation_at_batch_boundary() {
        let path = write_log("httpdlog_test_cancel.log", &format!("{GOOD}\n"));
        let bound = bound(false);
        let mut reader = FileReader::open(&bound, &path).unwrap();
        let cancel = AtomicBool::new(true);

        assert!(reader.next_batch(&cancel).unwrap().is_none());
        assert!(reader.is_finished());
        assert_eq!(reader.stats().total_rows, 0);
        std::fs::remove_file(&path).ok();
    }
}
