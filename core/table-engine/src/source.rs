//! FILENAME: core/table-engine/src/source.rs
//! PURPOSE: Raw table input and access to the table's source lines.
//! CONTEXT: The pipeline consumes already-extracted cell text (`RawTableData`).
//! When the table lives in a document, a `DocumentTableReader` hands back
//! each physical line's cells exactly as written, so the view can show a
//! cell's source text next to its formatted value. Physical rows count the
//! header and the delimiter line, hence `TABLE_HEADER_ROWS`.

use serde::{Deserialize, Serialize};

/// Lines preceding the first data row: header and delimiter.
pub const TABLE_HEADER_ROWS: usize = 2;

// ============================================================================
// RAW DATA
// ============================================================================

/// Column names plus one list of cell texts per row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawTableData { columns, rows }
    }

    /// Text of one cell. Short rows read as empty cells.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

// ============================================================================
// DOCUMENT READER
// ============================================================================

/// Access to the literal cells of the table in its document.
pub trait DocumentTableReader {
    /// Cells of a physical table line, as written. `None` past the end.
    fn row_cells(&self, physical_row: usize) -> Option<Vec<String>>;
}

/// Reads the first pipe table (`| a | b |`) found in a text.
#[derive(Debug, Clone, Default)]
pub struct PipeTableReader {
    lines: Vec<String>,
}

impl PipeTableReader {
    pub fn new(document: &str) -> Self {
        let lines = document
            .lines()
            .map(str::trim)
            .skip_while(|line| !line.starts_with('|'))
            .take_while(|line| line.starts_with('|'))
            .map(str::to_string)
            .collect();
        PipeTableReader { lines }
    }

    /// Number of physical lines, header and delimiter included.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Column names and data rows with `\|` unescaped.
    pub fn to_raw_data(&self) -> RawTableData {
        let mut rows = self
            .lines
            .iter()
            .map(|line| split_cells(line).into_iter().map(|c| c.replace("\\|", "|")).collect::<Vec<_>>());
        let columns = rows.next().unwrap_or_default();
        let rows = rows.skip(TABLE_HEADER_ROWS - 1).collect();
        RawTableData::new(columns, rows)
    }
}

impl DocumentTableReader for PipeTableReader {
    fn row_cells(&self, physical_row: usize) -> Option<Vec<String>> {
        self.lines.get(physical_row).map(|line| split_cells(line))
    }
}

/// Splits a table line on unescaped pipes, dropping the outer ones.
fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = match line.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => line,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in line.chars() {
        match c {
            '|' if !escaped => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        escaped = c == '\\' && !escaped;
    }
    cells.push(current.trim().to_string());
    cells
}
