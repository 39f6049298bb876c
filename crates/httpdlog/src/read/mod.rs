//! Read — the caller-facing scan surface: glob expansion, format binding,
//! and multi-threaded reading across files.
//!
//! The compiled format is bound once and shared read-only by all workers;
//! each file is owned by exactly one reader and scanned sequentially.
//! Across files, row order is unspecified.

pub mod file;
pub mod line_reader;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;

use crate::detect::{detect_builtin, detect_from_conf, DetectedFormat, DETECTION_SAMPLE_SIZE};
use crate::error::ReadError;
use crate::extract::Row;
use crate::format::{compile, ParsedFormat};
use crate::options::{builtin_format, ReadOptions};
use crate::schema::{data_column_count, schema_for, Column};

pub use file::FileReader;
pub use line_reader::LineReader;

/// Rows per batch handed back by a file reader.
pub const BATCH_SIZE: usize = 2048;

/// Aggregate scan counters, reported per file and merged across a scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub total_rows: u64,
    pub parse_errors: u64,
    pub bytes_scanned: u64,
    pub files_processed: u64,
}

impl ScanStats {
    pub fn merge(&mut self, other: &ScanStats) {
        self.total_rows += other.total_rows;
        self.parse_errors += other.parse_errors;
        self.bytes_scanned += other.bytes_scanned;
        self.files_processed += other.files_processed;
    }
}

/// The immutable result of binding: resolved format (absent in the raw
/// fallback), its classification, and the derived schema.
#[derive(Debug)]
pub struct BoundFormat {
    pub format: Option<ParsedFormat>,
    pub kind: DetectedFormat,
    pub raw: bool,
    pub schema: Vec<Column>,
    pub data_columns: usize,
}

pub(crate) fn bound_from(parsed: ParsedFormat, kind: DetectedFormat, raw: bool) -> BoundFormat {
    let schema = schema_for(Some(&parsed), raw);
    let data_columns = data_column_count(&schema, raw);
    BoundFormat {
        format: Some(parsed),
        kind,
        raw,
        schema,
        data_columns,
    }
}

fn raw_fallback() -> BoundFormat {
    let schema = schema_for(None, true);
    BoundFormat {
        format: None,
        kind: DetectedFormat::Unknown,
        raw: true,
        data_columns: 0,
        schema,
    }
}

/// A bound reader over one or more log files.
#[derive(Debug)]
pub struct LogReader {
    files: Vec<PathBuf>,
    bound: BoundFormat,
    cancel: Arc<AtomicBool>,
}

impl LogReader {
    /// Expand the glob, resolve the format per the options, and derive the
    /// schema. All schema-affecting errors surface here; scanning never
    /// changes the schema.
    pub fn open(pattern: &str, options: ReadOptions) -> Result<Self, ReadError> {
        options.validate()?;
        let files = expand_glob(pattern)?;
        let bound = bind(&files, &options)?;
        tracing::info!(
            pattern,
            files = files.len(),
            format = bound.kind.as_str(),
            raw = bound.raw,
            "bound httpd log reader"
        );
        Ok(Self {
            files,
            bound,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn schema(&self) -> &[Column] {
        &self.bound.schema
    }

    pub fn format(&self) -> Option<&ParsedFormat> {
        self.bound.format.as_ref()
    }

    pub fn format_kind(&self) -> DetectedFormat {
        self.bound.kind
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Shared cooperative-cancellation flag, observed at batch boundaries.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Open one file for scanning. The host decides which thread drives it.
    pub fn open_file(&self, index: usize) -> Result<FileReader<'_>, ReadError> {
        FileReader::open(&self.bound, &self.files[index])
    }

    /// Scan every file to completion, one worker thread per core, and
    /// collect all rows. Rows keep file order within a file; order across
    /// files is unspecified.
    pub fn read_all(&self) -> Result<(Vec<Row>, ScanStats), ReadError> {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(self.files.len().max(1));
        let next_file = AtomicUsize::new(0);

        let results: Vec<Result<(Vec<Row>, ScanStats), ReadError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut rows = Vec::new();
                        let mut stats = ScanStats::default();
                        loop {
                            let index = next_file.fetch_add(1, Ordering::Relaxed);
                            if index >= self.files.len() {
                                break;
                            }
                            let (file_rows, file_stats) = self.scan_one(index)?;
                            rows.extend(file_rows);
                            stats.merge(&file_stats);
                        }
                        Ok((rows, stats))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("scan worker panicked"))
                .collect()
        });

        let mut rows = Vec::new();
        let mut stats = ScanStats::default();
        for result in results {
            let (worker_rows, worker_stats) = result?;
            rows.extend(worker_rows);
            stats.merge(&worker_stats);
        }
        Ok((rows, stats))
    }

    fn scan_one(&self, index: usize) -> Result<(Vec<Row>, ScanStats), ReadError> {
        let mut reader = self.open_file(index)?;
        if !reader.try_initialize_scan() {
            return Ok((Vec::new(), ScanStats::default()));
        }
        let mut rows = Vec::new();
        while let Some(batch) = reader.next_batch(&self.cancel)? {
            rows.extend(batch);
        }
        Ok((rows, reader.stats()))
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, ReadError> {
    let entries = glob::glob(pattern)
        .map_err(|e| ReadError::Config(format!("invalid glob pattern {pattern:?}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ReadError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ReadError::Config(format!(
            "no files found matching pattern {pattern:?}"
        )));
    }
    Ok(files)
}

/// Resolve the format: explicit string, conf lookup, named built-in, or
/// auto-detection, in that order of precedence.
fn bind(files: &[PathBuf], options: &ReadOptions) -> Result<BoundFormat, ReadError> {
    if let Some(format_str) = &options.format_str {
        let parsed = compile(format_str)?;
        let kind = DetectedFormat::of_format_str(format_str);
        return Ok(bound_from(parsed, kind, options.raw));
    }

    if let Some(conf_path) = &options.conf {
        let entries = crate::conf::parse_config_file(conf_path).map_err(|e| {
            ReadError::Config(format!(
                "cannot read conf file {}: {e}",
                conf_path.display()
            ))
        })?;
        let samples = sample_lines(files)?;
        let parsed = detect_from_conf(
            &entries,
            options.format_type.as_deref(),
            &samples,
            &files[0],
        )?;
        let kind = DetectedFormat::of_format_str(&parsed.format_str);
        return Ok(bound_from(parsed, kind, options.raw));
    }

    if let Some(name) = &options.format_type {
        let format_str =
            builtin_format(name).ok_or_else(|| ReadError::InvalidFormatType(name.clone()))?;
        let parsed = compile(format_str)?;
        return Ok(bound_from(parsed, DetectedFormat::of_format_str(format_str), options.raw));
    }

    let samples = sample_lines(files)?;
    match detect_builtin(&samples) {
        Some((kind, parsed)) => Ok(bound_from(parsed, kind, options.raw)),
        None if options.raw => Ok(raw_fallback()),
        None => Err(ReadError::NoMatchingFormat {
            path: files[0].clone(),
        }),
    }
}

/// Up to ten non-empty lines from the head of the first file that opens.
fn sample_lines(files: &[PathBuf]) -> Result<Vec<String>, ReadError> {
    let mut last_err: Option<std::io::Error> = None;

    for path in files {
        match LineReader::open(path) {
            Ok(mut reader) => return head_lines(&mut reader).map_err(ReadError::Io),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot sample file");
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .map(ReadError::Io)
        .unwrap_or_else(|| ReadError::Config("no files to sample".to_string())))
}

fn head_lines(reader: &mut LineReader) -> std::io::Result<Vec<String>> {
    let mut buf = Vec::new();
    let mut samples = Vec::new();
    while samples.len() < DETECTION_SAMPLE_SIZE && reader.read_line(&mut buf)? {
        if buf.is_empty() {
            continue;
        }
        samples.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(samples)
}

// ── Tests ───────────────────────────────────────────────────────
