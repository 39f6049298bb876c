//! Detect — picks a log format by trial-matching sample lines.
//!
//! With no conf file the canonical Combined and Common formats are tried
//! in that order; with a conf file its entries drive the candidate list.
//! A candidate is accepted when at least half the samples (rounding up,
//! and never zero) match its compiled regex.

use std::path::Path;

use serde::Serialize;

use crate::conf::{ConfigEntry, FormatSource};
use crate::error::ReadError;
use crate::extract::{extract_line, ExtractScratch};
use crate::format::{compile, ParsedFormat, COMBINED_FORMAT, COMMON_FORMAT};

/// Sample lines taken from the head of the first available file.
pub const DETECTION_SAMPLE_SIZE: usize = 10;

/// The resolved shape of the bound format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedFormat {
    Common,
    Combined,
    Custom,
    Unknown,
}

impl DetectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFormat::Common => "common",
            DetectedFormat::Combined => "combined",
            DetectedFormat::Custom => "custom",
            DetectedFormat::Unknown => "unknown",
        }
    }

    /// Classify a format string against the canonical constants.
    pub fn of_format_str(format_str: &str) -> Self {
        match format_str {
            COMMON_FORMAT => DetectedFormat::Common,
            COMBINED_FORMAT => DetectedFormat::Combined,
            _ => DetectedFormat::Custom,
        }
    }
}

fn match_count(format: &ParsedFormat, samples: &[String]) -> usize {
    let mut scratch = ExtractScratch::new(format);
    samples
        .iter()
        .filter(|line| extract_line(format, line, false, &mut scratch).is_some())
        .count()
}

/// At least half the samples, rounding up; an empty sample set never
/// accepts anything.
fn meets_threshold(matches: usize, sample_count: usize) -> bool {
    matches > 0 && matches >= sample_count.div_ceil(2)
}

/// Try the canonical formats against the samples: Combined first, then
/// Common. Returns `None` when neither reaches the threshold.
pub fn detect_builtin(samples: &[String]) -> Option<(DetectedFormat, ParsedFormat)> {
    for (kind, format_str) in [
        (DetectedFormat::Combined, COMBINED_FORMAT),
        (DetectedFormat::Common, COMMON_FORMAT),
    ] {
        let parsed = compile(format_str).expect("canonical format compiles");
        let matches = match_count(&parsed, samples);
        tracing::debug!(format = kind.as_str(), matches, samples = samples.len(), "detection trial");
        if meets_threshold(matches, samples.len()) {
            return Some((kind, parsed));
        }
    }
    None
}

/// Pick a format from conf entries. With a nickname only `named` entries
/// carrying it are tried; otherwise `default` entries first, then
/// `inline`, then `named`. Entries are tried in line-number order within
/// each class.
pub fn detect_from_conf(
    entries: &[ConfigEntry],
    nickname: Option<&str>,
    samples: &[String],
    log_path: &Path,
) -> Result<ParsedFormat, ReadError> {
    let mut sorted: Vec<&ConfigEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.line_number);

    let candidates: Vec<&ConfigEntry> = match nickname {
        Some(name) => {
            let named: Vec<&ConfigEntry> = sorted
                .iter()
                .copied()
                .filter(|e| {
                    e.format_type == FormatSource::Named && e.nickname.as_deref() == Some(name)
                })
                .collect();
            if named.is_empty() {
                return Err(ReadError::InvalidFormatType(name.to_string()));
            }
            named
        }
        None => [FormatSource::Default, FormatSource::Inline, FormatSource::Named]
            .iter()
            .flat_map(|class| {
                sorted
                    .iter()
                    .copied()
                    .filter(move |e| e.format_type == *class)
            })
            .collect(),
    };

    for entry in candidates {
        let Some(format_str) = entry.format_string.as_deref() else {
            continue;
        };
        let parsed = match compile(format_str) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(
                    config_file = %entry.config_file,
                    line_number = entry.line_number,
                    error = %err,
                    "skipping conf format that does not compile"
                );
                continue;
            }
        };
        let matches = match_count(&parsed, samples);
        if meets_threshold(matches, samples.len()) {
            tracing::debug!(
                config_file = %entry.config_file,
                line_number = entry.line_number,
                matches,
                "selected conf format"
            );
            return Ok(parsed);
        }
    }

    Err(ReadError::NoMatchingFormat {
        path: log_path.to_path_buf(),
    })
}

// ── Tests ───────────────────────────────────────────────────────
