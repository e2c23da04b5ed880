//! FILENAME: core/table-engine/src/schema.rs
//! PURPOSE: Derives the typed column descriptors of a table.
//! CONTEXT: One descriptor per raw column, in raw order. Each carries the
//! column's alias, type, editability, resolved formats and compiled
//! formatter. Descriptors are rebuilt wholesale whenever the configuration,
//! the column names or the registered native formatters change.

use crate::definition::{non_blank, ColumnConfig, TableConfig};
use crate::error::TableError;
use crate::formats::{resolve_formats, ResolvedFormats};
use crate::formatter::{CellFormatter, ColumnFormatter};
use engine::{ColumnType, DateFormat};
use log::warn;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Header text of the column.
    pub name: String,
    /// Name used by sort keys and expressions.
    pub alias: String,
    /// Position in the raw column list.
    pub index: usize,
    pub kind: ColumnType,
    pub editable: bool,
    pub formats: ResolvedFormats,
    pub formatter: ColumnFormatter,
}

impl ColumnDescriptor {
    /// The format cells of this column are parsed and rendered with.
    pub fn field_format(&self) -> &DateFormat {
        self.formats.field_format(self.kind)
    }

    /// The token read as `true` in boolean columns.
    pub fn yes_token(&self) -> &str {
        &self.formats.yes_label
    }
}

/// Builds the descriptors for `names`.
///
/// Native formatters are keyed by column name and take precedence over a
/// configured formatter rule. Rules that do not compile are returned as
/// diagnostics and the column keeps the default formatter.
pub fn derive_columns(
    names: &[String],
    config: &TableConfig,
    natives: &FxHashMap<String, Arc<dyn CellFormatter>>,
) -> (Vec<ColumnDescriptor>, Vec<TableError>) {
    let empty = ColumnConfig::default();
    let settings: Vec<&ColumnConfig> = names
        .iter()
        .map(|name| config.column(name).unwrap_or(&empty))
        .collect();

    let aliases: Vec<&str> = names
        .iter()
        .zip(&settings)
        .map(|(name, column)| non_blank(column.alias.as_deref()).unwrap_or(name))
        .collect();

    let mut diagnostics = Vec::new();
    let columns = names
        .iter()
        .zip(&settings)
        .enumerate()
        .map(|(index, (name, column))| {
            let kind = column.column_type();
            let formatter = match (natives.get(name), column.formatter_rule()) {
                (Some(native), _) => ColumnFormatter::Native(native.clone()),
                (None, Some(rule)) => match ColumnFormatter::compile(name, rule, &aliases) {
                    Ok(formatter) => formatter,
                    Err(err) => {
                        warn!(target: "SCHEMA", "{}", err);
                        diagnostics.push(err);
                        ColumnFormatter::Default
                    }
                },
                (None, None) => ColumnFormatter::Default,
            };

            ColumnDescriptor {
                name: name.clone(),
                alias: aliases[index].to_string(),
                index,
                kind,
                editable: column.editable.or(config.editable).unwrap_or(false),
                formats: resolve_formats(column, config),
                formatter,
            }
        })
        .collect();

    (columns, diagnostics)
}

/// Finds a column by alias, then by header name. Later columns win.
pub fn find_column<'a>(columns: &'a [ColumnDescriptor], key: &str) -> Option<&'a ColumnDescriptor> {
    columns
        .iter()
        .rev()
        .find(|c| c.alias == key)
        .or_else(|| columns.iter().rev().find(|c| c.name == key))
}
