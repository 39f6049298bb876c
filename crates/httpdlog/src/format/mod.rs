//! Format — the LogFormat compiler: directive catalogs, field model,
//! strftime subset, and the regex-emitting compiler itself.

pub mod compile;
pub mod directive;
pub mod field;
pub mod strftime;

pub use compile::compile;
pub use field::{ColumnType, FormatField, ParsedFormat, TimestampGroup, TimestampKind};

/// Canonical Common Log Format.
pub const COMMON_FORMAT: &str = r#"%h %l %u %t "%r" %>s %b"#;

/// Canonical Combined Log Format.
pub const COMBINED_FORMAT: &str = r#"%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i""#;
