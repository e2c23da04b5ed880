//! FILENAME: core/table-engine/src/sort.rs
//! PURPOSE: Orders rows by a single column.
//! CONTEXT: A sort key names a column by alias (or header name), optionally
//! prefixed with `-` for descending or `+` for ascending. Values compare by
//! type: numbers numerically, temporal values by instant, booleans
//! false < true, text by byte order, empty values first. Descending reverses
//! the key comparison only; the original row index always breaks ties in
//! ascending order, so the sort is stable in both directions.

use crate::schema::{find_column, ColumnDescriptor};
use crate::view::Row;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    /// Parses "-Age", "+Age" or "Age". Blank keys yield `None`.
    pub fn parse(key: &str) -> Option<SortKey> {
        let key = key.trim();
        let (column, descending) = if let Some(rest) = key.strip_prefix('-') {
            (rest, true)
        } else if let Some(rest) = key.strip_prefix('+') {
            (rest, false)
        } else {
            (key, false)
        };

        let column = column.trim();
        if column.is_empty() {
            return None;
        }
        Some(SortKey {
            column: column.to_string(),
            descending,
        })
    }

    /// Compares two rows on this key. Unknown columns compare equal.
    pub fn compare(&self, column: usize, a: &Row, b: &Row) -> Ordering {
        let ordering = match (a.cells.get(column), b.cells.get(column)) {
            (Some(x), Some(y)) => x.value.sort_cmp(&y.value),
            _ => Ordering::Equal,
        };
        let ordering = if self.descending {
            ordering.reverse()
        } else {
            ordering
        };
        ordering.then_with(|| a.index.cmp(&b.index))
    }
}

/// Sorts `rows` in place. An absent key or unknown column leaves them as is.
pub fn sort_rows(rows: &mut [Row], key: Option<&str>, columns: &[ColumnDescriptor]) {
    let Some(key) = key.and_then(SortKey::parse) else {
        return;
    };
    let Some(column) = find_column(columns, &key.column) else {
        log::debug!(target: "SORT", "ignoring sort on unknown column '{}'", key.column);
        return;
    };

    let index = column.index;
    rows.sort_by(|a, b| key.compare(index, a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Cell, RowValues};
    use engine::TypedValue;

    fn row(index: usize, value: TypedValue) -> Row {
        Row {
            index,
            cells: vec![Cell {
                column: 0,
                raw: String::new(),
                value,
                formatted: String::new(),
                source: String::new(),
            }],
            values: RowValues::default(),
        }
    }

    fn order(rows: &[Row]) -> Vec<usize> {
        rows.iter().map(|r| r.index).collect()
    }

    fn columns() -> Vec<ColumnDescriptor> {
        let config = crate::definition::TableConfig::default();
        crate::schema::derive_columns(&["Age".to_string()], &config, &Default::default()).0
    }

    #[test]
    fn parses_direction_prefix() {
        assert_eq!(
            SortKey::parse("-Age"),
            Some(SortKey {
                column: "Age".into(),
                descending: true
            })
        );
        assert_eq!(SortKey::parse("+Age").map(|k| k.descending), Some(false));
        assert_eq!(SortKey::parse(" Age ").map(|k| k.column), Some("Age".to_string()));
        assert_eq!(SortKey::parse("-"), None);
        assert_eq!(SortKey::parse(""), None);
    }

    #[test]
    fn numeric_sort_is_not_lexical() {
        let mut rows = vec![
            row(0, TypedValue::number(10.0)),
            row(1, TypedValue::number(9.0)),
            row(2, TypedValue::number(100.0)),
        ];
        sort_rows(&mut rows, Some("Age"), &columns());
        assert_eq!(order(&rows), vec![1, 0, 2]);
    }

    #[test]
    fn descending_keeps_ties_in_original_order() {
        let mut rows = vec![
            row(0, TypedValue::number(1.0)),
            row(1, TypedValue::number(2.0)),
            row(2, TypedValue::number(1.0)),
            row(3, TypedValue::number(2.0)),
        ];
        sort_rows(&mut rows, Some("-Age"), &columns());
        assert_eq!(order(&rows), vec![1, 3, 0, 2]);
    }

    #[test]
    fn empty_values_sort_first_ascending() {
        let mut rows = vec![
            row(0, TypedValue::text("b")),
            row(1, TypedValue::Empty),
            row(2, TypedValue::text("a")),
        ];
        sort_rows(&mut rows, Some("Age"), &columns());
        assert_eq!(order(&rows), vec![1, 2, 0]);
    }

    #[test]
    fn unknown_or_absent_key_is_a_no_op() {
        let mut rows = vec![
            row(0, TypedValue::number(3.0)),
            row(1, TypedValue::number(1.0)),
        ];
        sort_rows(&mut rows, Some("Height"), &columns());
        assert_eq!(order(&rows), vec![0, 1]);
        sort_rows(&mut rows, None, &columns());
        assert_eq!(order(&rows), vec![0, 1]);
    }
}
