//! Options — caller-facing reader configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::format::{COMBINED_FORMAT, COMMON_FORMAT};

/// Options consumed by the reader at bind time.
///
/// `format_str` wins over everything else. Without it, `format_type` names
/// a built-in (`common`/`combined`) — or, when `conf` is given, a nickname
/// to look up there. With neither, the format is auto-detected from sample
/// lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub format_str: Option<String>,
    pub format_type: Option<String>,
    pub conf: Option<PathBuf>,
    /// Keep parse-error rows and expose `line_number`/`parse_error`/
    /// `raw_line` columns.
    pub raw: bool,
}

impl ReadOptions {
    pub fn validate(&self) -> Result<(), ReadError> {
        if matches!(self.format_str.as_deref(), Some("")) {
            return Err(ReadError::Config(
                "format_str must not be empty".to_string(),
            ));
        }
        if matches!(self.format_type.as_deref(), Some("")) {
            return Err(ReadError::Config(
                "format_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve a built-in format name to its format string.
pub fn builtin_format(name: &str) -> Option<&'static str> {
    match name {
        "common" => Some(COMMON_FORMAT),
        "combined" => Some(COMBINED_FORMAT),
        _ => None,
    }
}

// ── Tests ───────────────────────────────────────────────────────
