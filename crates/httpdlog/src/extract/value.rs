//! Value — the typed cell model for extracted rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One typed column value. Intervals carry microseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnValue {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Timestamp(DateTime<Utc>),
    IntervalMicros(i64),
    Bool(bool),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One extracted output row, in schema order.
pub type Row = Vec<ColumnValue>;
