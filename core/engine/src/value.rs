//! FILENAME: core/engine/src/value.rs
//! PURPOSE: Semantic column types and the typed value a cell is coerced into.
//! CONTEXT: A raw cell string is converted into a `TypedValue` according to
//! its column's `ColumnType`. Typed values are what sorting, filtering and
//! formatter expressions operate on; display strings are derived from them.

use crate::date_format::DateFormat;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The semantic type declared for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Time,
    DateTime,
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::String
    }
}

impl ColumnType {
    /// Resolves a configured type name. Unknown names yield `None` so the
    /// caller can apply its default.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_lowercase().as_str() {
            "string" | "text" => ColumnType::String,
            "number" | "numeric" => ColumnType::Number,
            "boolean" | "bool" | "checkbox" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "datetime" | "date-time" | "timestamp" => ColumnType::DateTime,
            _ => return None,
        };
        Some(kind)
    }
}

/// Metadata retained with a parsed number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumberKind {
    Decimal,
    /// Currency with its symbol, e.g. "$" or "€".
    Currency(String),
    Percent,
}

/// A cell's value coerced to its column's semantic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    /// Missing value: empty cell or failed coercion.
    Empty,
    Text(String),
    Number { value: f64, kind: NumberKind },
    Boolean(bool),
    Date { value: NaiveDate, format: DateFormat },
    Time { value: NaiveTime, format: DateFormat },
    DateTime { value: NaiveDateTime, format: DateFormat },
}

impl TypedValue {
    pub fn number(value: f64) -> Self {
        TypedValue::Number {
            value,
            kind: NumberKind::Decimal,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        TypedValue::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TypedValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedValue::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Seconds-resolution instant used to order temporal values.
    /// Times order within a single day.
    pub fn as_instant(&self) -> Option<NaiveDateTime> {
        match self {
            TypedValue::Date { value, .. } => Some(value.and_time(NaiveTime::MIN)),
            TypedValue::DateTime { value, .. } => Some(*value),
            TypedValue::Time { value, .. } => Some(NaiveDate::MIN.and_time(*value)),
            _ => None,
        }
    }

    /// Re-stringifies the value using the format it was parsed with.
    /// Numbers use their shortest representation; empty yields "".
    pub fn to_plain_string(&self) -> String {
        match self {
            TypedValue::Empty => String::new(),
            TypedValue::Text(s) => s.clone(),
            TypedValue::Number { value, .. } => crate::number_format::format_general(*value),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Date { value, format } => format.format_date(*value),
            TypedValue::Time { value, format } => format.format_time(*value),
            TypedValue::DateTime { value, format } => format.format_datetime(*value),
        }
    }

    /// Orders two values of the same column.
    ///
    /// Empty values sort before anything else. Numbers compare numerically,
    /// temporal values by instant, booleans false < true, and text by plain
    /// byte order. Mismatched kinds fall back to comparing their plain strings.
    pub fn sort_cmp(&self, other: &TypedValue) -> Ordering {
        match (self, other) {
            (TypedValue::Empty, TypedValue::Empty) => Ordering::Equal,
            (TypedValue::Empty, _) => Ordering::Less,
            (_, TypedValue::Empty) => Ordering::Greater,
            (TypedValue::Number { value: a, .. }, TypedValue::Number { value: b, .. }) => {
                a.total_cmp(b)
            }
            (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a.cmp(b),
            (TypedValue::Text(a), TypedValue::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_instant(), b.as_instant()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.to_plain_string().cmp(&b.to_plain_string()),
            },
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        TypedValue::Empty
    }
}
