//! Extractor — applies a compiled format to one log line.
//!
//! The compiled regex runs once per line into preallocated capture
//! locations owned by the scan thread, not by the shared `ParsedFormat`.
//! A regex miss is a parse failure (`None`); per-field conversion problems
//! degrade to null and never fail the row.

use crate::extract::convert;
use crate::extract::value::{ColumnValue, Row};
use crate::format::field::{FormatField, ParsedFormat, TimestampGroup, TimestampKind};
use regex::CaptureLocations;

/// Per-thread capture scratch. Lives in the scan state so one compiled
/// format can serve many worker threads without synchronization.
#[derive(Debug)]
pub struct ExtractScratch {
    locations: CaptureLocations,
}

impl ExtractScratch {
    pub fn new(format: &ParsedFormat) -> Self {
        Self {
            locations: format.regex.capture_locations(),
        }
    }
}

/// Extract the data columns for one line. Returns `None` when the line
/// does not match the compiled regex; metadata columns (`log_file` and the
/// raw-mode trio) are appended by the caller.
pub fn extract_line(
    format: &ParsedFormat,
    line: &str,
    raw_mode: bool,
    scratch: &mut ExtractScratch,
) -> Option<Row> {
    format
        .regex
        .captures_read(&mut scratch.locations, line)?;

    let mut row = Row::with_capacity(format.fields.len() + 4);
    let mut group_idx = 1usize;

    for (field_idx, field) in format.fields.iter().enumerate() {
        if field.is_timestamp() {
            let gid = field.timestamp_group.expect("timestamp field outside group");
            let group = &format.timestamp_groups[gid];
            if group.leader() == field_idx {
                // Member captures are consecutive, starting at the
                // leader's group index.
                let texts: Vec<&str> = (0..group.len())
                    .map(|k| capture_text(&scratch.locations, line, group_idx + k))
                    .collect();
                let (instant, raw) = combine_timestamp_group(format, group, &texts);
                row.push(
                    instant
                        .map(ColumnValue::Timestamp)
                        .unwrap_or(ColumnValue::Null),
                );
                if raw_mode {
                    row.push(ColumnValue::Text(raw));
                }
            }
            group_idx += 1;
            continue;
        }

        if field.should_skip {
            // Compiled as a non-capturing group; consumes no index.
            continue;
        }

        let text = capture_text(&scratch.locations, line, group_idx);
        group_idx += 1;

        if field.is_request() {
            push_request_columns(&mut row, field, text);
        } else {
            row.push(convert::convert_regular(field, text));
        }
    }

    Some(row)
}

fn capture_text<'l>(locations: &CaptureLocations, line: &'l str, group: usize) -> &'l str {
    match locations.get(group) {
        Some((start, end)) => &line[start..end],
        None => "",
    }
}

fn push_request_columns(row: &mut Row, field: &FormatField, text: &str) {
    let split = convert::split_request(text);
    let (method, path, query, protocol) = match split {
        Some(parts) => parts,
        // A request that does not split keeps empty strings for the text
        // sub-columns and null for the query string.
        None => (String::new(), String::new(), None, String::new()),
    };

    if !field.skip_method {
        row.push(ColumnValue::Text(method));
    }
    if !field.skip_path {
        row.push(ColumnValue::Text(path));
    }
    if !field.skip_query_string {
        row.push(query.map(ColumnValue::Text).unwrap_or(ColumnValue::Null));
    }
    if !field.skip_protocol {
        row.push(ColumnValue::Text(protocol));
    }
}

/// Combine the captures of one timestamp group into a single instant.
///
/// Full-timestamp components (Apache default, epoch, concatenated
/// strftime) supply the base; fractional components add to it; a lone
/// `%z` supplies only an offset and never a base. Bases that are already
/// UTC-adjusted (Apache default, strftime containing `%z`) are not
/// re-adjusted by a separate offset.
fn combine_timestamp_group(
    format: &ParsedFormat,
    group: &TimestampGroup,
    texts: &[&str],
) -> (Option<chrono::DateTime<chrono::Utc>>, String) {
    let raw = texts.join(" ");

    let mut base_us: Option<i64> = None;
    let mut base_is_utc_adjusted = false;
    let mut frac_us = 0i64;
    let mut strf_value = String::new();
    let mut strf_format = String::new();
    let mut has_strftime = false;

    for (k, &field_idx) in group.field_indices.iter().enumerate() {
        let field = &format.fields[field_idx];
        let text = texts[k];

        match field.timestamp_kind {
            TimestampKind::ApacheDefault => {
                if let Some(ts) = convert::parse_clf_timestamp(text) {
                    base_us = Some(ts.timestamp_micros());
                    base_is_utc_adjusted = true;
                }
            }
            TimestampKind::EpochSec => {
                if let Ok(v) = text.parse::<i64>() {
                    base_us = Some(v * convert::MICROS_PER_SEC);
                }
            }
            TimestampKind::EpochMsec => {
                if let Ok(v) = text.parse::<i64>() {
                    base_us = Some(v * convert::MICROS_PER_MSEC);
                }
            }
            TimestampKind::EpochUsec => {
                if let Ok(v) = text.parse::<i64>() {
                    base_us = Some(v);
                }
            }
            TimestampKind::FracMsec => {
                if let Ok(v) = text.parse::<i64>() {
                    frac_us += v * convert::MICROS_PER_MSEC;
                }
            }
            TimestampKind::FracUsec => {
                if let Ok(v) = text.parse::<i64>() {
                    frac_us += v;
                }
            }
            TimestampKind::Strftime => {
                if has_strftime {
                    strf_value.push(' ');
                    strf_format.push(' ');
                }
                strf_value.push_str(text);
                strf_format.push_str(&field.strftime_format);
                has_strftime = true;
            }
        }
    }

    let mut lone_offset_secs: Option<i64> = None;
    if has_strftime && base_us.is_none() {
        if let Some(us) = crate::format::strftime::parse_value(&strf_value, &strf_format) {
            base_us = Some(us);
            if strf_format.contains("%z") {
                base_is_utc_adjusted = true;
            }
        } else if strf_format == "%z" {
            lone_offset_secs = convert::parse_tz_offset(&strf_value);
        }
    }

    let instant = base_us.map(|mut us| {
        us += frac_us;
        if let Some(offset) = lone_offset_secs {
            if !base_is_utc_adjusted {
                us -= offset * convert::MICROS_PER_SEC;
            }
        }
        us
    });

    (instant.and_then(convert::timestamp_from_micros), raw)
}

// ── Tests ───────────────────────────────────────────────────────
