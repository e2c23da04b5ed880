//! FILENAME: core/table-engine/src/view.rs
//! Table View - Materialized output for the rendering layer.
//!
//! A `Row` is produced for every raw row on each pipeline run. It carries its
//! cells in column order plus an alias-keyed view of the same typed values,
//! and the row's original position for tie-breaking and source lookups.

use crate::schema::ColumnDescriptor;
use engine::TypedValue;
use rustc_hash::FxHashMap;

/// Typed values of one row, keyed by column alias.
pub type RowValues = FxHashMap<String, TypedValue>;

// ============================================================================
// CELLS AND ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Index of the owning column descriptor.
    pub column: usize,
    /// Raw cell text as handed to the pipeline.
    pub raw: String,
    pub value: TypedValue,
    /// Display string produced by the column's formatter.
    pub formatted: String,
    /// Unformatted text recovered from the document; empty without one.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position in the raw data, before sort, filter and pagination.
    pub index: usize,
    pub cells: Vec<Cell>,
    pub values: RowValues,
}

impl Row {
    /// Typed value of a column, by alias.
    pub fn value(&self, alias: &str) -> Option<&TypedValue> {
        self.values.get(alias)
    }

    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Display strings in column order.
    pub fn formatted(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.formatted.as_str()).collect()
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// Read-only view over every row of the current run, used by expressions
/// for aggregates and row counts.
#[derive(Clone, Copy)]
pub struct Dataset<'a> {
    rows: &'a [Row],
    columns: &'a [ColumnDescriptor],
}

impl<'a> Dataset<'a> {
    pub fn new(rows: &'a [Row], columns: &'a [ColumnDescriptor]) -> Self {
        Dataset { rows, columns }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &'a [Row] {
        self.rows
    }

    pub fn columns(&self) -> &'a [ColumnDescriptor] {
        self.columns
    }

    /// Every row's value for an alias. `None` for unknown aliases.
    pub fn column(&self, alias: &str) -> Option<Vec<&'a TypedValue>> {
        let column = self.columns.iter().rev().find(|c| c.alias == alias)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.cells.get(column.index).map(|cell| &cell.value))
                .collect(),
        )
    }
}
