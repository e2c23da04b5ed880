//! FILENAME: core/table-engine/src/filter.rs
//! PURPOSE: Decides which rows survive the filter expression.
//! CONTEXT: The filter is compiled once per expression and column set, then
//! evaluated per row against the row's typed values and the full pre-filter
//! dataset. A row whose predicate errors, or yields something that is not a
//! boolean, is excluded and the failure logged. A filter that does not
//! compile excludes every row; its diagnostic is kept for the caller.
//! Numbers and the texts TRUE/FALSE coerce to booleans. `ROWNUM()` counts
//! rows in sorted order.

use crate::error::TableError;
use crate::expression::{self, RowScope};
use crate::schema::ColumnDescriptor;
use crate::view::{Dataset, Row};
use engine::EvalResult;
use log::warn;
use parser::Expression;

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFilter {
    /// No filter: every row passes.
    PassAll,
    Predicate { source: String, ast: Expression },
    /// The expression did not compile: no row passes.
    Invalid(TableError),
}

impl CompiledFilter {
    pub fn compile(source: Option<&str>, columns: &[ColumnDescriptor]) -> Self {
        let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
            return CompiledFilter::PassAll;
        };

        let aliases: Vec<&str> = columns.iter().map(|c| c.alias.as_str()).collect();
        match expression::compile(source, &aliases) {
            Ok(ast) => CompiledFilter::Predicate {
                source: source.to_string(),
                ast,
            },
            Err(message) => {
                let err = TableError::Filter {
                    source_text: source.to_string(),
                    message,
                };
                warn!(target: "FILTER", "{}", err);
                CompiledFilter::Invalid(err)
            }
        }
    }

    /// The compile diagnostic, if the filter is invalid.
    pub fn diagnostic(&self) -> Option<&TableError> {
        match self {
            CompiledFilter::Invalid(err) => Some(err),
            _ => None,
        }
    }

    /// Evaluates the predicate for the row at `position` in `dataset`.
    pub fn matches(&self, row: &Row, position: usize, dataset: Dataset<'_>) -> bool {
        let (source, ast) = match self {
            CompiledFilter::PassAll => return true,
            CompiledFilter::Invalid(_) => return false,
            CompiledFilter::Predicate { source, ast } => (source, ast),
        };

        let scope = RowScope {
            values: &row.values,
            current: None,
            dataset,
            row_index: position,
        };
        match scope.evaluate(ast) {
            EvalResult::Error(e) => {
                warn!(target: "FILTER", "row {}: '{}' failed with {}", row.index, source, e);
                false
            }
            other => other.as_boolean().unwrap_or_else(|| {
                warn!(
                    target: "FILTER",
                    "row {}: '{}' is not a boolean ({})",
                    row.index,
                    source,
                    other.as_text()
                );
                false
            }),
        }
    }
}

/// Keeps the rows that pass `filter`, preserving their order.
pub fn filter_rows(mut rows: Vec<Row>, filter: &CompiledFilter, columns: &[ColumnDescriptor]) -> Vec<Row> {
    if *filter == CompiledFilter::PassAll {
        return rows;
    }

    let keep: Vec<bool> = {
        let dataset = Dataset::new(&rows, columns);
        rows.iter()
            .enumerate()
            .map(|(position, row)| filter.matches(row, position, dataset))
            .collect()
    };
    let mut flags = keep.into_iter();
    rows.retain(|_| flags.next().unwrap_or(false));
    rows
}
