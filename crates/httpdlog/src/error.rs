//! Error — bind-time error taxonomy for the reader.
//!
//! Only schema-affecting failures are errors: a bad option set, a format
//! string the regex engine rejects, or detection coming up empty. Row-level
//! and value-level failures are recovered as data (null columns or
//! parse-error rows) and never surface here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    /// Bad option combination, unreadable conf file, or an empty glob.
    #[error("invalid reader configuration: {0}")]
    Config(String),

    /// The format string compiled to a pattern the regex engine rejects.
    #[error("invalid log format {format:?}: {reason}")]
    InvalidFormat { format: String, reason: String },

    /// Unknown built-in format name, or a conf nickname that does not exist.
    #[error("invalid format type {0:?} (expected 'common', 'combined', or a conf nickname)")]
    InvalidFormatType(String),

    /// Detection produced no viable candidate and raw mode was not forced.
    #[error("no matching log format for {}", .path.display())]
    NoMatchingFormat { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
