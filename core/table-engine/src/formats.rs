//! FILENAME: core/table-engine/src/formats.rs
//! PURPOSE: Resolves the effective display formats of a column.
//! CONTEXT: Column settings override table settings, which override the
//! built-in defaults. Time columns always use the canonical time format.
//! Nothing here fails: unset, blank or unparseable settings fall back.

use crate::definition::{non_blank, ColumnConfig, TableConfig};
use engine::{
    ColumnType, DateFormat, NumberFormatSpec, DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT,
    TIME_FORMAT,
};

pub const DEFAULT_YES_LABEL: &str = "Yes";
pub const DEFAULT_NO_LABEL: &str = "No";

/// The formats a column renders and parses with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFormats {
    pub date: DateFormat,
    pub datetime: DateFormat,
    pub time: DateFormat,
    pub number: NumberFormatSpec,
    pub yes_label: String,
    pub no_label: String,
}

impl ResolvedFormats {
    /// The date-field format used for a column of the given type.
    pub fn field_format(&self, kind: ColumnType) -> &DateFormat {
        match kind {
            ColumnType::Time => &self.time,
            ColumnType::DateTime => &self.datetime,
            _ => &self.date,
        }
    }
}

pub fn resolve_formats(column: &ColumnConfig, table: &TableConfig) -> ResolvedFormats {
    let column_date = non_blank(column.date_format.as_deref());

    let date = column_date
        .or(non_blank(table.date_format.as_deref()))
        .unwrap_or(DEFAULT_DATE_FORMAT);
    let datetime = column_date
        .or(non_blank(table.datetime_format.as_deref()))
        .unwrap_or(DEFAULT_DATETIME_FORMAT);

    let yes_label = non_blank(column.yes_format.as_deref())
        .or(non_blank(table.yes_format.as_deref()))
        .unwrap_or(DEFAULT_YES_LABEL);
    let no_label = non_blank(column.no_format.as_deref())
        .or(non_blank(table.no_format.as_deref()))
        .unwrap_or(DEFAULT_NO_LABEL);

    ResolvedFormats {
        date: DateFormat::new(date),
        datetime: DateFormat::new(datetime),
        time: DateFormat::new(TIME_FORMAT),
        number: NumberFormatSpec::from_pattern_or_default(non_blank(column.number_format.as_deref())),
        yes_label: yes_label.to_string(),
        no_label: no_label.to_string(),
    }
}
