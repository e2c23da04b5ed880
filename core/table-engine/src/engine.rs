//! FILENAME: core/table-engine/src/engine.rs
//! Table Engine - The render pipeline and its state.
//!
//! `TableEngine` owns the interactive state of one table (sort key, filter,
//! pagination) plus its inputs (configuration, raw data, document reader,
//! host handle, native formatters), and keeps the materialized view current.
//!
//! Every mutator refreshes synchronously. A refresh runs:
//! 1. Column derivation (only when config, column names or formatters changed)
//! 2. Materialization: typed values first, then display strings
//! 3. Sort
//! 4. Filter, against the full sorted dataset
//! 5. Pagination, after recording the unpaginated total
//!
//! Inputs are compared by identity. Each identity change bumps a revision
//! counter, and a refresh whose revisions and state all match the previous
//! run is skipped.

use crate::definition::TableConfig;
use crate::error::TableError;
use crate::extract::extract_value;
use crate::filter::{filter_rows, CompiledFilter};
use crate::formatter::{format_cell, CellFormatter, FormatEnv, HostHandle};
use crate::pagination::{paginate, PaginationPatch, PaginationState};
use crate::schema::{derive_columns, ColumnDescriptor};
use crate::sort::sort_rows;
use crate::source::{DocumentTableReader, RawTableData, TABLE_HEADER_ROWS};
use crate::view::{Cell, Dataset, Row};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Everything a render depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RenderKey {
    config: u64,
    data: u64,
    document: u64,
    host: u64,
    formatters: u64,
    sort: Option<String>,
    filter: Option<String>,
    pagination: Option<PaginationState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Revisions {
    config: u64,
    data: u64,
    document: u64,
    host: u64,
    formatters: u64,
    /// Bumped whenever the column descriptors are rebuilt.
    columns: u64,
}

/// Identity of two optional shared values, ignoring vtables.
fn same_arc<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

pub struct TableEngine {
    config: Arc<TableConfig>,
    data: Arc<RawTableData>,
    document: Option<Arc<dyn DocumentTableReader>>,
    host: Option<HostHandle>,
    natives: FxHashMap<String, Arc<dyn CellFormatter>>,

    sort: Option<String>,
    filter: Option<String>,
    pagination: Option<PaginationState>,

    revisions: Revisions,
    columns: Vec<ColumnDescriptor>,
    columns_key: Option<(u64, Vec<String>, u64)>,
    schema_diagnostics: Vec<TableError>,
    compiled_filter: CompiledFilter,
    filter_key: Option<(Option<String>, u64)>,

    last_render: Option<RenderKey>,
    rows: Vec<Row>,
    total: usize,
    render_count: u64,
}

impl TableEngine {
    /// Creates an engine seeded from the configuration and renders it.
    pub fn new(config: Arc<TableConfig>, data: Arc<RawTableData>) -> Self {
        let mut engine = TableEngine {
            config,
            data,
            document: None,
            host: None,
            natives: FxHashMap::default(),
            sort: None,
            filter: None,
            pagination: None,
            revisions: Revisions::default(),
            columns: Vec::new(),
            columns_key: None,
            schema_diagnostics: Vec::new(),
            compiled_filter: CompiledFilter::PassAll,
            filter_key: None,
            last_render: None,
            rows: Vec::new(),
            total: 0,
            render_count: 0,
        };
        engine.seed_from_config();
        engine.refresh();
        engine
    }

    // ========================================================================
    // MUTATORS
    // ========================================================================

    /// Sets the sort key, e.g. "Age" or "-Age". `None` keeps the data order.
    pub fn set_sort(&mut self, key: Option<&str>) {
        self.sort = key.map(str::to_string);
        self.refresh();
    }

    /// Sets the filter expression. `None` shows every row.
    pub fn set_filter(&mut self, expression: Option<&str>) {
        self.filter = expression.map(str::to_string);
        self.refresh();
    }

    /// Merges a pagination update into the current state. Without pagination
    /// the update starts from the default state.
    pub fn update_pagination(&mut self, patch: PaginationPatch) {
        let mut state = self.pagination.take().unwrap_or_default();
        state.apply(patch);
        self.pagination = Some(state);
        self.refresh();
    }

    /// Replaces the configuration. A new configuration re-seeds sort, filter
    /// and pagination from its initial values.
    pub fn set_config(&mut self, config: Arc<TableConfig>) {
        if !Arc::ptr_eq(&self.config, &config) {
            self.config = config;
            self.revisions.config += 1;
            self.seed_from_config();
        }
        self.refresh();
    }

    pub fn set_data(&mut self, data: Arc<RawTableData>) {
        if !Arc::ptr_eq(&self.data, &data) {
            self.data = data;
            self.revisions.data += 1;
        }
        self.refresh();
    }

    /// Attaches the document the table is read from, for source text lookups.
    pub fn set_document(&mut self, document: Option<Arc<dyn DocumentTableReader>>) {
        if !same_arc(self.document.as_ref(), document.as_ref()) {
            self.document = document;
            self.revisions.document += 1;
        }
        self.refresh();
    }

    pub fn set_host(&mut self, host: Option<HostHandle>) {
        if !same_arc(self.host.as_ref(), host.as_ref()) {
            self.host = host;
            self.revisions.host += 1;
        }
        self.refresh();
    }

    /// Installs a native formatter for a column, by header name. It takes
    /// precedence over a configured formatter rule.
    pub fn register_formatter(&mut self, column: impl Into<String>, formatter: Arc<dyn CellFormatter>) {
        self.natives.insert(column.into(), formatter);
        self.revisions.formatters += 1;
        self.refresh();
    }

    /// Removes a native formatter. Returns whether one was registered.
    pub fn unregister_formatter(&mut self, column: &str) -> bool {
        let removed = self.natives.remove(column).is_some();
        if removed {
            self.revisions.formatters += 1;
            self.refresh();
        }
        removed
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Rows of the current page.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn pagination(&self) -> Option<&PaginationState> {
        self.pagination.as_ref()
    }

    /// Rows left after filtering, before pagination.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn page_count(&self) -> usize {
        self.pagination
            .as_ref()
            .map(|state| state.page_count(self.total))
            .unwrap_or(1)
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn config(&self) -> &Arc<TableConfig> {
        &self.config
    }

    pub fn data(&self) -> &Arc<RawTableData> {
        &self.data
    }

    /// Formatter rules and the filter expression that failed to compile.
    pub fn diagnostics(&self) -> Vec<TableError> {
        self.schema_diagnostics
            .iter()
            .chain(self.compiled_filter.diagnostic())
            .cloned()
            .collect()
    }

    /// Number of pipeline runs so far; skipped refreshes do not count.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    fn seed_from_config(&mut self) {
        self.sort = self.config.sort.clone();
        self.filter = self.config.filter.clone();
        self.pagination = self
            .config
            .pagination
            .as_ref()
            .map(PaginationState::from_config);
    }

    fn render_key(&self) -> RenderKey {
        RenderKey {
            config: self.revisions.config,
            data: self.revisions.data,
            document: self.revisions.document,
            host: self.revisions.host,
            formatters: self.revisions.formatters,
            sort: self.sort.clone(),
            filter: self.filter.clone(),
            pagination: self.pagination.clone(),
        }
    }

    fn refresh(&mut self) {
        let key = self.render_key();
        if self.last_render.as_ref() == Some(&key) {
            return;
        }

        self.update_columns();
        self.update_filter();

        let mut rows = self.materialize();
        sort_rows(&mut rows, self.sort.as_deref(), &self.columns);
        let rows = filter_rows(rows, &self.compiled_filter, &self.columns);
        self.total = rows.len();
        self.rows = paginate(rows, self.pagination.as_ref());

        self.last_render = Some(key);
        self.render_count += 1;
        debug!(
            target: "TABLE",
            "rendered {} of {} rows (sort {:?}, filter {:?}, page {:?})",
            self.rows.len(),
            self.total,
            self.sort,
            self.filter,
            self.pagination.as_ref().map(|p| p.page)
        );
    }

    fn update_columns(&mut self) {
        let current = self.columns_key.as_ref().is_some_and(|(config, names, formatters)| {
            *config == self.revisions.config
                && *names == self.data.columns
                && *formatters == self.revisions.formatters
        });
        if current {
            return;
        }

        let (columns, diagnostics) = derive_columns(&self.data.columns, &self.config, &self.natives);
        debug!(target: "TABLE", "derived {} columns", columns.len());
        self.columns = columns;
        self.schema_diagnostics = diagnostics;
        self.columns_key = Some((
            self.revisions.config,
            self.data.columns.clone(),
            self.revisions.formatters,
        ));
        self.revisions.columns += 1;
    }

    fn update_filter(&mut self) {
        let key = (self.filter.clone(), self.revisions.columns);
        if self.filter_key.as_ref() == Some(&key) {
            return;
        }
        self.compiled_filter = CompiledFilter::compile(self.filter.as_deref(), &self.columns);
        self.filter_key = Some(key);
    }

    /// Builds every row: typed values and source text, then display strings.
    fn materialize(&self) -> Vec<Row> {
        let data = &self.data;
        let mut rows: Vec<Row> = (0..data.rows.len())
            .map(|index| {
                let source = self
                    .document
                    .as_ref()
                    .and_then(|doc| doc.row_cells(index + TABLE_HEADER_ROWS))
                    .unwrap_or_default();

                let cells: Vec<Cell> = self
                    .columns
                    .iter()
                    .map(|column| {
                        let raw = data.cell(index, column.index);
                        Cell {
                            column: column.index,
                            raw: raw.to_string(),
                            value: extract_value(raw, column),
                            formatted: String::new(),
                            source: source.get(column.index).cloned().unwrap_or_default(),
                        }
                    })
                    .collect();

                let values = self
                    .columns
                    .iter()
                    .zip(&cells)
                    .map(|(column, cell)| (column.alias.clone(), cell.value.clone()))
                    .collect();

                Row { index, cells, values }
            })
            .collect();

        let formatted: Vec<Vec<String>> = {
            let env = FormatEnv {
                dataset: Dataset::new(&rows, &self.columns),
                host: self.host.as_ref(),
            };
            rows.iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .zip(&self.columns)
                        .map(|(cell, column)| format_cell(column, &cell.value, &row.values, row.index, &env))
                        .collect()
                })
                .collect()
        };

        for (row, texts) in rows.iter_mut().zip(formatted) {
            for (cell, text) in row.cells.iter_mut().zip(texts) {
                cell.formatted = text;
            }
        }
        rows
    }
}
