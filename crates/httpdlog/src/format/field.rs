//! Field — the compiled data model for a LogFormat string.
//!
//! A `FormatField` is one directive occurrence; `ParsedFormat` is the
//! immutable result of compilation and is shared read-only across scan
//! threads. Capture scratch never lives here (see `extract::extractor`).

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Output column type. Intervals are always carried as microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Int32,
    Int64,
    Timestamp,
    Interval,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Interval => "interval",
            ColumnType::Boolean => "boolean",
        }
    }
}

/// How a `%t` occurrence encodes its instant, classified from the modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampKind {
    /// `[10/Oct/2000:13:55:36 -0700]` — the CLF bracket form.
    ApacheDefault,
    EpochSec,
    EpochMsec,
    EpochUsec,
    /// `%{msec_frac}t` — exactly three digits, added to a base.
    FracMsec,
    /// `%{usec_frac}t` — exactly six digits, added to a base.
    FracUsec,
    /// Any other modifier is a strftime format (after `begin:`/`end:` strip).
    Strftime,
}

/// One directive occurrence in the input format.
#[derive(Debug, Clone)]
pub struct FormatField {
    /// Canonical directive, e.g. `%h`, `%>s`, `%^ti`.
    pub directive: String,
    /// The `{…}` payload, empty when absent.
    pub modifier: String,
    /// The directive sits between `"` in the format string.
    pub is_quoted: bool,
    /// Resolved output column name; collision resolution may rewrite it.
    pub column_name: String,
    pub column_type: ColumnType,
    /// Captured (or structurally present) but not emitted in the schema.
    /// Losing collision duplicates and non-leader timestamp-group members
    /// are flagged rather than removed, so fields and capture groups stay
    /// positionally aligned.
    pub should_skip: bool,

    // %r decomposition overrides, set when the individual directive also
    // appears in the format.
    pub skip_method: bool,
    pub skip_path: bool,
    pub skip_query_string: bool,
    pub skip_protocol: bool,

    // %t metadata.
    pub timestamp_kind: TimestampKind,
    pub strftime_format: String,
    pub is_end_timestamp: bool,
    pub timestamp_group: Option<usize>,
}

impl FormatField {
    pub fn is_timestamp(&self) -> bool {
        self.directive == "%t"
    }

    pub fn is_request(&self) -> bool {
        matches!(self.directive.as_str(), "%r" | "%>r" | "%<r")
    }

    /// Whether this field owns a regex capture group. Skipped fields are
    /// demoted to non-capturing groups, except that every member of a
    /// timestamp group keeps capturing so the leader can recombine them.
    pub fn captures(&self) -> bool {
        !self.should_skip || self.is_timestamp()
    }
}

/// A maximal run of consecutive `%t` fields with the same begin/end
/// polarity, combined into one logical timestamp column.
#[derive(Debug, Clone)]
pub struct TimestampGroup {
    /// Field indices, in format order. The first is the leader.
    pub field_indices: Vec<usize>,
    pub is_end: bool,
    pub has_apache: bool,
    pub has_epoch: bool,
    pub has_frac: bool,
    pub has_strftime: bool,
}

impl TimestampGroup {
    pub fn leader(&self) -> usize {
        self.field_indices[0]
    }

    pub fn len(&self) -> usize {
        self.field_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_indices.is_empty()
    }
}

/// Immutable result of compiling a LogFormat string.
#[derive(Debug)]
pub struct ParsedFormat {
    pub format_str: String,
    pub fields: Vec<FormatField>,
    pub timestamp_groups: Vec<TimestampGroup>,
    pub regex_pattern: String,
    pub regex: Regex,
}

impl ParsedFormat {
    /// Number of capture groups the emitted regex carries: every
    /// non-skipped field plus every skipped timestamp-group member.
    pub fn capture_count(&self) -> usize {
        self.fields.iter().filter(|f| f.captures()).count()
    }
}
