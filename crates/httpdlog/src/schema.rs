//! Schema — derives the ordered output column list from a parsed format.
//!
//! The projection is: each non-skipped field in format order (timestamp
//! leaders expand to `timestamp` plus a raw column in raw mode, `%r`
//! expands to up to four sub-columns), then `log_file`, then the raw-mode
//! metadata trio.

use serde::Serialize;

use crate::format::{ColumnType, ParsedFormat};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Build the output schema. `format` is `None` in the raw fallback, where
/// detection found nothing and only the metadata columns remain.
pub fn schema_for(format: Option<&ParsedFormat>, raw: bool) -> Vec<Column> {
    let mut columns = Vec::new();

    if let Some(parsed) = format {
        for (field_idx, field) in parsed.fields.iter().enumerate() {
            if field.should_skip {
                continue;
            }

            if field.is_timestamp() {
                let gid = field.timestamp_group.expect("timestamp field outside group");
                if parsed.timestamp_groups[gid].leader() != field_idx {
                    continue;
                }
                columns.push(Column::new(field.column_name.clone(), ColumnType::Timestamp));
                if raw {
                    columns.push(Column::new(
                        format!("{}_raw", field.column_name),
                        ColumnType::Text,
                    ));
                }
                continue;
            }

            if field.is_request() {
                if !field.skip_method {
                    columns.push(Column::new("method", ColumnType::Text));
                }
                if !field.skip_path {
                    columns.push(Column::new("path", ColumnType::Text));
                }
                if !field.skip_query_string {
                    columns.push(Column::new("query_string", ColumnType::Text));
                }
                if !field.skip_protocol {
                    columns.push(Column::new("protocol", ColumnType::Text));
                }
                continue;
            }

            columns.push(Column::new(field.column_name.clone(), field.column_type));
        }
    }

    columns.push(Column::new("log_file", ColumnType::Text));
    if raw {
        columns.push(Column::new("line_number", ColumnType::Int64));
        columns.push(Column::new("parse_error", ColumnType::Boolean));
        columns.push(Column::new("raw_line", ColumnType::Text));
    }

    columns
}

/// Number of data columns (everything before `log_file`).
pub fn data_column_count(columns: &[Column], raw: bool) -> usize {
    let metadata = if raw { 4 } else { 1 };
    columns.len() - metadata
}

// ── Tests ───────────────────────────────────────────────────────
