//! FILENAME: core/table-engine/src/expression.rs
//! PURPOSE: Compiles user-authored rules and binds them to a row.
//! CONTEXT: Filter and formatter rules share one expression language.
//! A rule is parsed once and its column references are checked against the
//! known aliases, so a typo is reported when the table is configured rather
//! than silently failing on every row. `RowScope` then exposes a single row,
//! the cell being formatted and the dataset to the evaluator.

use crate::view::{Dataset, RowValues};
use engine::{EvalContext, EvalResult, Evaluator, TypedValue};
use parser::Expression;

/// Parses `source` and checks that every referenced column exists.
/// On failure returns the message to report.
pub fn compile(source: &str, aliases: &[&str]) -> Result<Expression, String> {
    let expr = parser::parse(source).map_err(|e| e.message)?;

    let unknown: Vec<&str> = expr
        .referenced_columns()
        .into_iter()
        .filter(|name| !aliases.contains(name))
        .collect();
    if !unknown.is_empty() {
        return Err(format!("Unknown column: {}", unknown.join(", ")));
    }

    Ok(expr)
}

/// Evaluation context for one row.
pub struct RowScope<'a> {
    pub values: &'a RowValues,
    pub current: Option<&'a TypedValue>,
    pub dataset: Dataset<'a>,
    pub row_index: usize,
}

impl<'a> RowScope<'a> {
    pub fn evaluate(&self, expr: &Expression) -> EvalResult {
        Evaluator::new(self).evaluate(expr)
    }
}

impl EvalContext for RowScope<'_> {
    fn column_value(&self, alias: &str) -> Option<&TypedValue> {
        self.values.get(alias)
    }

    fn current_value(&self) -> Option<&TypedValue> {
        self.current
    }

    fn dataset_column(&self, alias: &str) -> Option<Vec<&TypedValue>> {
        self.dataset.column(alias)
    }

    fn row_count(&self) -> usize {
        self.dataset.len()
    }

    fn row_index(&self) -> Option<usize> {
        Some(self.row_index)
    }
}
