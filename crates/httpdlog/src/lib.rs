//! httpdlog — a query-time reader for Apache httpd access/error logs.
//!
//! Given one or more log paths (optionally a glob), an Apache `LogFormat`
//! string (explicit, named, pulled from an `httpd.conf`, or auto-detected),
//! and a handful of options, the reader materializes typed rows whose
//! schema is derived from the format string itself.
//!
//! ```rust,ignore
//! let reader = LogReader::open(
//!     "/var/log/apache2/access.log*",
//!     ReadOptions { format_type: Some("combined".into()), ..Default::default() },
//! )?;
//! let (rows, stats) = reader.read_all()?;
//! ```
//!
//! A malformed line never poisons a scan: outside raw mode it is skipped,
//! in raw mode it becomes a row with `parse_error = true` and the original
//! text in `raw_line`.

// Core subsystems
pub mod error;
pub mod extract;
pub mod format;

// Bind-time collaborators
pub mod conf;
pub mod detect;
pub mod options;
pub mod schema;

// Scan surface
pub mod read;

pub use conf::{parse_config_file, ConfigEntry, FormatSource, LogKind};
pub use detect::DetectedFormat;
pub use error::ReadError;
pub use extract::{ColumnValue, Row};
pub use format::{ColumnType, ParsedFormat, COMBINED_FORMAT, COMMON_FORMAT};
pub use options::ReadOptions;
pub use read::{FileReader, LogReader, ScanStats, BATCH_SIZE};
pub use schema::Column;
