//! FILENAME: core/table-engine/src/lib.rs
//! Typed table views for document-embedded tables.
//!
//! This crate turns raw cell text plus a declarative configuration into a
//! typed, formatted, sorted, filtered and paginated view. It depends on
//! `engine` for typed values, formats and expression evaluation, and on
//! `parser` for the expression language.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the table IS)
//! - `schema` / `formats` / `extract` / `formatter`: typed columns and cells
//! - `sort` / `filter` / `pagination`: row transforms, applied in that order
//! - `view`: Renderable output (WHAT we display)
//! - `engine`: The pipeline and its state (HOW we render)
//! - `source`: Raw input and document access

pub mod definition;
pub mod engine;
pub mod error;
pub mod expression;
pub mod extract;
pub mod filter;
pub mod formats;
pub mod formatter;
pub mod pagination;
pub mod schema;
pub mod sort;
pub mod source;
pub mod view;

pub use definition::{ColumnConfig, PaginationConfig, TableConfig};
pub use self::engine::TableEngine;
pub use error::{TableError, TableResult};
pub use extract::extract_value;
pub use filter::{filter_rows, CompiledFilter};
pub use formats::{resolve_formats, ResolvedFormats, DEFAULT_NO_LABEL, DEFAULT_YES_LABEL};
pub use formatter::{format_cell, format_default, CellFormatter, ColumnFormatter, FormatEnv, HostHandle};
pub use pagination::{paginate, PaginationPatch, PaginationState, DEFAULT_PAGE_SIZE};
pub use schema::{derive_columns, find_column, ColumnDescriptor};
pub use sort::{sort_rows, SortKey};
pub use source::{DocumentTableReader, PipeTableReader, RawTableData, TABLE_HEADER_ROWS};
pub use view::{Cell, Dataset, Row, RowValues};

pub use ::engine::{ColumnType, NumberKind, TypedValue};
