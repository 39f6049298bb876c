//! Convert — typed-value conversion helpers for captured fragments.
//!
//! All conversions are total: malformed input yields null, never a
//! row-level failure. The two deliberate exceptions to the `-`-to-null
//! policy are `%X` (where `-` means a closed connection) and the named
//! byte-count columns (where CLF writes `-` for zero bytes).

use chrono::{DateTime, TimeZone, Utc};

use crate::extract::value::ColumnValue;
use crate::format::field::{ColumnType, FormatField};

pub const MICROS_PER_SEC: i64 = 1_000_000;
pub const MICROS_PER_MSEC: i64 = 1_000;

/// Byte-count columns where CLF's `-` means zero rather than null.
const BYTE_COLUMNS: &[&str] = &[
    "bytes",
    "bytes_clf",
    "bytes_received",
    "bytes_sent",
    "bytes_transferred",
];

pub fn is_byte_column(name: &str) -> bool {
    BYTE_COLUMNS.contains(&name)
}

/// Parse the Apache CLF timestamp dialect: `10/Oct/2000:13:55:36 -0700`.
/// The result is normalized to UTC.
pub fn parse_clf_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%d/%b/%Y:%H:%M:%S %z")
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse a bare `±HHMM` timezone offset into seconds.
pub fn parse_tz_offset(value: &str) -> Option<i64> {
    let bytes = value.as_bytes();
    if bytes.len() != 5 {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    if !bytes[1..].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = value[1..3].parse().ok()?;
    let minutes: i64 = value[3..5].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

pub fn timestamp_from_micros(epoch_us: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(epoch_us).single()
}

/// Split a request line (`GET /index.html?x=1 HTTP/1.0`) into method, path,
/// query string, and protocol. The query string keeps its leading `?`; an
/// absent or empty query yields `None`. Returns `None` when the line does
/// not have at least three whitespace-separated parts.
pub fn split_request(request: &str) -> Option<(String, String, Option<String>, String)> {
    let mut parts = request.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let protocol = parts.next()?;

    let (path, query) = match target.find('?') {
        Some(idx) if idx + 1 < target.len() => {
            (target[..idx].to_string(), Some(target[idx..].to_string()))
        }
        Some(idx) => (target[..idx].to_string(), None),
        None => (target.to_string(), None),
    };

    Some((method.to_string(), path, query, protocol.to_string()))
}

/// Scale a `%T`/`%D` value to microseconds. `%D` is already microseconds;
/// `%T` scales by its unit modifier, defaulting to seconds.
pub fn duration_micros(value: i64, directive: &str, modifier: &str) -> i64 {
    if directive.ends_with('D') {
        return value;
    }
    match modifier {
        "us" => value,
        "ms" => value * MICROS_PER_MSEC,
        _ => value * MICROS_PER_SEC,
    }
}

/// Map `%X` connection-status markers to words. The literal `-` means a
/// cleanly closed connection here, so it is never treated as null.
pub fn connection_status(value: &str) -> &str {
    match value {
        "X" => "aborted",
        "+" => "keepalive",
        "-" => "close",
        other => other,
    }
}

/// Convert a captured fragment for a plain (non-`%t`, non-`%r`) field.
pub fn convert_regular(field: &FormatField, value: &str) -> ColumnValue {
    match field.column_type {
        ColumnType::Text => {
            if field.directive == "%X" {
                ColumnValue::Text(connection_status(value).to_string())
            } else if value == "-" {
                ColumnValue::Null
            } else {
                ColumnValue::Text(value.to_string())
            }
        }
        ColumnType::Int32 => {
            if value == "-" {
                ColumnValue::Null
            } else {
                value
                    .parse::<i32>()
                    .map(ColumnValue::Int32)
                    .unwrap_or(ColumnValue::Null)
            }
        }
        ColumnType::Int64 => {
            if value == "-" {
                if is_byte_column(&field.column_name) {
                    ColumnValue::Int64(0)
                } else {
                    ColumnValue::Null
                }
            } else {
                value
                    .parse::<i64>()
                    .map(ColumnValue::Int64)
                    .unwrap_or(ColumnValue::Null)
            }
        }
        ColumnType::Interval => {
            if value == "-" {
                ColumnValue::Null
            } else {
                value
                    .parse::<i64>()
                    .map(|v| {
                        ColumnValue::IntervalMicros(duration_micros(
                            v,
                            &field.directive,
                            &field.modifier,
                        ))
                    })
                    .unwrap_or(ColumnValue::Null)
            }
        }
        // Timestamps flow through group combination, booleans are
        // metadata-only; a regular field never carries these types.
        ColumnType::Timestamp | ColumnType::Boolean => ColumnValue::Null,
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::compile;

    fn field_for(fmt: &str) -> FormatField {
        compile(fmt).unwrap().fields.remove(0)
    }

    #[test]
    fn test_clf_timestamp_normalizes_to_utc() {
        let ts = parse_clf_timestamp("10/Oct/2000:13:55:36 -0700").unwrap();
        assert_eq!(ts.to_rfc3339(), "2000-10-10T20:55:36+00:00");
    }

    #[test]
    fn test_clf_timestamp_rejects_garbage() {
        assert!(parse_clf_timestamp("not a timestamp").is_none());
        assert!(parse_clf_timestamp("10/Oct/2000:13:55:36").is_none());
    }

    #[test]
    fn test_tz_offset() {
        assert_eq!(parse_tz_offset("+0000"), Some(0));
        assert_eq!(parse_tz_offset("-0700"), Some(-25200));
        assert_eq!(parse_tz_offset("+0530"), Some(19800));
        assert_eq!(parse_tz_offset("0700"), None);
        assert_eq!(parse_tz_offset("+07:00"), None);
    }

    #[test]
    fn test_split_request_with_query() {
        let (method, path, query, protocol) = split_request("POST /a?x=1 HTTP/1.1").unwrap();
        assert_eq!(method, "POST");
        assert_eq!(path, "/a");
        assert_eq!(query.as_deref(), Some("?x=1"));
        assert_eq!(protocol, "HTTP/1.1");
    }

    #[test]
    fn test_split_request_without_query() {
        let (_, path, query, _) = split_request("GET /index.html HTTP/1.0").unwrap();
        assert_eq!(path, "/index.html");
        assert_eq!(query, None);
    }

    #[test]
    fn test_split_request_empty_query_is_none() {
        let (_, path, query, _) = split_request("GET /a? HTTP/1.1").unwrap();
        assert_eq!(path, "/a");
        assert_eq!(query, None);
    }

    #[test]
    fn test_split_request_too_few_parts() {
        assert!(split_request("GET /index.html").is_none());
        assert!(split_request("").is_none());
    }

    #[test]
    fn test_duration_scaling() {
        assert_eq!(duration_micros(5, "%D", ""), 5);
        assert_eq!(duration_micros(5, "%<D", ""), 5);
        assert_eq!(duration_micros(5, "%T", ""), 5_000_000);
        assert_eq!(duration_micros(5, "%T", "s"), 5_000_000);
        assert_eq!(duration_micros(5, "%T", "ms"), 5_000);
        assert_eq!(duration_micros(5, "%T", "us"), 5);
    }

    #[test]
    fn test_connection_status_markers() {
        assert_eq!(connection_status("X"), "aborted");
        assert_eq!(connection_status("+"), "keepalive");
        assert_eq!(connection_status("-"), "close");
        assert_eq!(connection_status("?"), "?");
    }

    #[test]
    fn test_dash_is_null_for_text() {
        let field = field_for("%h");
        assert_eq!(convert_regular(&field, "-"), ColumnValue::Null);
        assert_eq!(
            convert_regular(&field, "10.0.0.1"),
            ColumnValue::Text("10.0.0.1".to_string())
        );
    }

    #[test]
    fn test_dash_is_close_for_connection_status() {
        let field = field_for("%X");
        assert_eq!(
            convert_regular(&field, "-"),
            ColumnValue::Text("close".to_string())
        );
    }

    #[test]
    fn test_dash_is_zero_for_byte_columns() {
        let field = field_for("%b");
        assert_eq!(convert_regular(&field, "-"), ColumnValue::Int64(0));
        assert_eq!(convert_regular(&field, "2326"), ColumnValue::Int64(2326));
    }

    #[test]
    fn test_dash_is_null_for_int32() {
        let field = field_for("%>s");
        assert_eq!(convert_regular(&field, "-"), ColumnValue::Null);
        assert_eq!(convert_regular(&field, "200"), ColumnValue::Int32(200));
    }

    #[test]
    fn test_malformed_number_is_null_not_error() {
        let field = field_for("%>s");
        assert_eq!(convert_regular(&field, "abc"), ColumnValue::Null);
    }

    #[test]
    fn test_interval_conversion() {
        let micro = field_for("%D");
        assert_eq!(
            convert_regular(&micro, "1500"),
            ColumnValue::IntervalMicros(1500)
        );
        let sec = field_for("%T");
        assert_eq!(
            convert_regular(&sec, "2"),
            ColumnValue::IntervalMicros(2_000_000)
        );
        assert_eq!(convert_regular(&sec, "-"), ColumnValue::Null);
    }
}
