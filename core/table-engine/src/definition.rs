//! FILENAME: core/table-engine/src/definition.rs
//! Table Definition - The serializable configuration.
//!
//! This module contains the types that DESCRIBE a table view:
//! table-level defaults, pagination policy and per-column settings.
//! These structures are:
//! - Deserialized from the JSON block embedded next to the table
//! - Immutable snapshots of user intent for one render cycle
//!
//! Keys use kebab-case (`page-size`, `date-format`, `yes-format`).
//! Every field is optional; missing values resolve to documented defaults.

use crate::error::TableResult;
use engine::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// TABLE CONFIGURATION
// ============================================================================

/// Configuration for a whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TableConfig {
    /// Initial sort key: a column alias, optionally prefixed with `-` or `+`.
    pub sort: Option<String>,

    /// Initial filter expression.
    pub filter: Option<String>,

    /// Pagination policy. Absent means every row is shown.
    pub pagination: Option<PaginationConfig>,

    /// Table-wide editability; columns may override it.
    pub editable: Option<bool>,

    /// Default format of date columns (e.g. "DD.MM.YYYY").
    pub date_format: Option<String>,

    /// Default format of datetime columns.
    pub datetime_format: Option<String>,

    /// Label rendered for true booleans, and the token read back as true.
    pub yes_format: Option<String>,

    /// Label rendered for false booleans.
    pub no_format: Option<String>,

    /// Per-column settings, keyed by the column's header name.
    pub columns: HashMap<String, ColumnConfig>,
}

impl TableConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> TableResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds or replaces the configuration of one column.
    pub fn with_column(mut self, name: impl Into<String>, column: ColumnConfig) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// The configuration of a column, if any.
    pub fn column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.get(name)
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PaginationConfig {
    /// Rows per page. Missing or zero falls back to the default size.
    pub page_size: Option<usize>,

    /// Sizes offered to the user. The page size is always one of them.
    pub page_sizes: Vec<usize>,
}

// ============================================================================
// COLUMN CONFIGURATION
// ============================================================================

/// Settings for a single column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ColumnConfig {
    /// Semantic type name: string, number, boolean, date, time, datetime.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Name used in sort keys and expressions. Defaults to the header.
    pub alias: Option<String>,

    pub editable: Option<bool>,

    /// Date or datetime format for this column.
    pub date_format: Option<String>,

    /// Number pattern, e.g. "#,##0.00" or "#.##0,00 €".
    pub number_format: Option<String>,

    pub yes_format: Option<String>,
    pub no_format: Option<String>,

    /// Expression computing the cell's display text.
    pub formatter: Option<String>,
}

impl ColumnConfig {
    pub fn new(kind: ColumnType) -> Self {
        ColumnConfig {
            kind: Some(format!("{:?}", kind).to_lowercase()),
            ..Default::default()
        }
    }

    /// The declared type. Missing or unknown names resolve to `string`.
    pub fn column_type(&self) -> ColumnType {
        self.kind
            .as_deref()
            .and_then(ColumnType::from_name)
            .unwrap_or_default()
    }

    /// The formatter rule, ignoring blank strings.
    pub fn formatter_rule(&self) -> Option<&str> {
        non_blank(self.formatter.as_deref())
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_formatter(mut self, rule: impl Into<String>) -> Self {
        self.formatter = Some(rule.into());
        self
    }
}

/// Treats empty and whitespace-only settings as unset.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
