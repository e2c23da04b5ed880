//! FILENAME: core/table-engine/src/formatter.rs
//! PURPOSE: Turns a cell's typed value into its display string.
//! CONTEXT: Every column owns a formatter. The default one renders by type
//! using the column's resolved formats. An expression formatter evaluates the
//! column's `formatter` rule with `@` bound to the cell's value and sibling
//! aliases bound to the row's typed values. A native formatter is supplied
//! by the host application through the `CellFormatter` trait.
//!
//! Formatters only ever see typed values, never formatted strings, so a row
//! can be formatted in any order. A formatter that fails falls back to the
//! default rendering for that cell.

use crate::error::{TableError, TableResult};
use crate::expression::{self, RowScope};
use crate::schema::ColumnDescriptor;
use crate::view::{Dataset, RowValues};
use engine::{EvalResult, TypedValue};
use log::warn;
use parser::Expression;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to the host application, passed through to native formatters.
pub type HostHandle = Arc<dyn Any + Send + Sync>;

/// What a formatter can see beyond its own row.
#[derive(Clone, Copy)]
pub struct FormatEnv<'a> {
    pub dataset: Dataset<'a>,
    pub host: Option<&'a HostHandle>,
}

/// A formatter implemented by the host application.
pub trait CellFormatter: Send + Sync {
    fn format(
        &self,
        value: &TypedValue,
        row: &RowValues,
        env: &FormatEnv<'_>,
    ) -> TableResult<String>;
}

impl<F> CellFormatter for F
where
    F: Fn(&TypedValue, &RowValues, &FormatEnv<'_>) -> TableResult<String> + Send + Sync,
{
    fn format(
        &self,
        value: &TypedValue,
        row: &RowValues,
        env: &FormatEnv<'_>,
    ) -> TableResult<String> {
        self(value, row, env)
    }
}

// ============================================================================
// COLUMN FORMATTER
// ============================================================================

#[derive(Clone)]
pub enum ColumnFormatter {
    Default,
    Expression { source: String, ast: Arc<Expression> },
    Native(Arc<dyn CellFormatter>),
}

impl ColumnFormatter {
    /// Compiles a formatter rule against the table's aliases.
    pub fn compile(column: &str, rule: &str, aliases: &[&str]) -> TableResult<Self> {
        match expression::compile(rule, aliases) {
            Ok(ast) => Ok(ColumnFormatter::Expression {
                source: rule.to_string(),
                ast: Arc::new(ast),
            }),
            Err(message) => Err(TableError::Formatter {
                column: column.to_string(),
                message,
            }),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ColumnFormatter::Default)
    }
}

impl Default for ColumnFormatter {
    fn default() -> Self {
        ColumnFormatter::Default
    }
}

impl fmt::Debug for ColumnFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnFormatter::Default => write!(f, "Default"),
            ColumnFormatter::Expression { source, .. } => write!(f, "Expression({:?})", source),
            ColumnFormatter::Native(native) => {
                write!(f, "Native({:p})", Arc::as_ptr(native) as *const ())
            }
        }
    }
}

impl PartialEq for ColumnFormatter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnFormatter::Default, ColumnFormatter::Default) => true,
            (
                ColumnFormatter::Expression { source: a, .. },
                ColumnFormatter::Expression { source: b, .. },
            ) => a == b,
            (ColumnFormatter::Native(a), ColumnFormatter::Native(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Type-driven rendering using the column's resolved formats.
pub fn format_default(value: &TypedValue, column: &ColumnDescriptor) -> String {
    match value {
        TypedValue::Empty => String::new(),
        TypedValue::Text(s) => s.clone(),
        TypedValue::Number { value, .. } => column.formats.number.format(*value),
        TypedValue::Boolean(true) => column.formats.yes_label.clone(),
        TypedValue::Boolean(false) => column.formats.no_label.clone(),
        temporal => temporal.to_plain_string(),
    }
}

/// Formats one cell of `row`.
pub fn format_cell(
    column: &ColumnDescriptor,
    value: &TypedValue,
    row: &RowValues,
    row_index: usize,
    env: &FormatEnv<'_>,
) -> String {
    let result = match &column.formatter {
        ColumnFormatter::Default => return format_default(value, column),
        ColumnFormatter::Expression { ast, .. } => {
            let scope = RowScope {
                values: row,
                current: Some(value),
                dataset: env.dataset,
                row_index,
            };
            match scope.evaluate(ast) {
                EvalResult::Error(e) => Err(TableError::FormatFailed {
                    column: column.name.clone(),
                    message: e.to_string(),
                }),
                other => Ok(other.as_text()),
            }
        }
        ColumnFormatter::Native(native) => native.format(value, row, env),
    };

    result.unwrap_or_else(|err| {
        warn!(target: "FORMAT", "row {}: {}", row_index, err);
        format_default(value, column)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ColumnConfig, TableConfig};
    use crate::schema::derive_columns;
    use engine::NumberKind;
    use rustc_hash::FxHashMap;

    fn price_column(config: ColumnConfig) -> Vec<ColumnDescriptor> {
        let table = TableConfig::default()
            .with_column("Price", config)
            .with_column("Qty", ColumnConfig::new(engine::ColumnType::Number));
        let names = vec!["Price".to_string(), "Qty".to_string()];
        let (columns, diagnostics) = derive_columns(&names, &table, &FxHashMap::default());
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        columns
    }

    fn row(price: f64, qty: f64) -> RowValues {
        let mut values = RowValues::default();
        values.insert("Price".to_string(), TypedValue::number(price));
        values.insert("Qty".to_string(), TypedValue::number(qty));
        values
    }

    fn env(columns: &[ColumnDescriptor]) -> FormatEnv<'_> {
        FormatEnv {
            dataset: Dataset::new(&[], columns),
            host: None,
        }
    }

    #[test]
    fn default_formatting_by_type() {
        let columns = price_column(ColumnConfig {
            kind: Some("number".into()),
            number_format: Some("$#,##0.00".into()),
            ..Default::default()
        });
        let value = TypedValue::Number {
            value: 1234.5,
            kind: NumberKind::Currency("$".into()),
        };
        assert_eq!(format_default(&value, &columns[0]), "$1,234.50");
        assert_eq!(format_default(&TypedValue::Empty, &columns[0]), "");
        assert_eq!(format_default(&TypedValue::Boolean(true), &columns[0]), "Yes");
    }

    #[test]
    fn expression_formatter_sees_siblings() {
        let columns = price_column(
            ColumnConfig::new(engine::ColumnType::Number).with_formatter("TEXT(@ * Qty, \"0.00\") & \" total\""),
        );
        let values = row(2.5, 4.0);
        let text = format_cell(&columns[0], &TypedValue::number(2.5), &values, 0, &env(&columns));
        assert_eq!(text, "10.00 total");
    }

    #[test]
    fn failing_expression_falls_back_to_default() {
        let columns = price_column(ColumnConfig::new(engine::ColumnType::Number).with_formatter("@ / Qty"));
        let values = row(3.0, 0.0);
        let text = format_cell(&columns[0], &TypedValue::number(3.0), &values, 0, &env(&columns));
        assert_eq!(text, "3");
    }

    #[test]
    fn native_formatter_receives_host_handle() {
        let mut columns = price_column(ColumnConfig::default());
        let native = |value: &TypedValue, _row: &RowValues, env: &FormatEnv<'_>| -> TableResult<String> {
            let prefix = env
                .host
                .and_then(|h| h.downcast_ref::<String>())
                .cloned()
                .unwrap_or_default();
            Ok(format!("{}{}", prefix, value.to_plain_string()))
        };
        columns[0].formatter = ColumnFormatter::Native(Arc::new(native));

        let host: HostHandle = Arc::new("~".to_string());
        let env = FormatEnv {
            dataset: Dataset::new(&[], &columns),
            host: Some(&host),
        };
        let text = format_cell(&columns[0], &TypedValue::number(7.0), &row(7.0, 1.0), 0, &env);
        assert_eq!(text, "~7");
    }

    #[test]
    fn failing_native_formatter_falls_back() {
        let mut columns = price_column(ColumnConfig::default());
        let native = |_: &TypedValue, _: &RowValues, _: &FormatEnv<'_>| -> TableResult<String> {
            Err(TableError::FormatFailed {
                column: "Price".into(),
                message: "boom".into(),
            })
        };
        columns[0].formatter = ColumnFormatter::Native(Arc::new(native));
        let text = format_cell(&columns[0], &TypedValue::text("raw"), &row(0.0, 0.0), 0, &env(&columns));
        assert_eq!(text, "raw");
    }

    #[test]
    fn compile_reports_column() {
        let err = ColumnFormatter::compile("Price", "@ * Missing", &["Price"]).unwrap_err();
        assert_eq!(
            err,
            TableError::Formatter {
                column: "Price".into(),
                message: "Unknown column: Missing".into(),
            }
        );
    }

    #[test]
    fn formatters_compare_by_rule_and_identity() {
        let a = ColumnFormatter::compile("c", "@ & \"x\"", &[]).unwrap();
        let b = ColumnFormatter::compile("c", "@ & \"x\"", &[]).unwrap();
        assert_eq!(a, b);

        let native: Arc<dyn CellFormatter> =
            Arc::new(|_: &TypedValue, _: &RowValues, _: &FormatEnv<'_>| -> TableResult<String> {
                Ok(String::new())
            });
        let same = ColumnFormatter::Native(native.clone());
        assert_eq!(ColumnFormatter::Native(native), same);
        assert_ne!(same, ColumnFormatter::Default);
    }
}
