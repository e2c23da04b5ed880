//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the value and expression engine.
//! CONTEXT: Re-exports typed values, number and date formats, and the
//! expression evaluator for use by the table engine.

pub mod date_format;
pub mod evaluator;
pub mod number_format;
pub mod value;

// Re-export commonly used types at the crate root
pub use date_format::{DateFormat, DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT, TIME_FORMAT};
pub use evaluator::{
    compare, EvalContext, EvalError, EvalResult, Evaluator, DEFAULT_STEP_LIMIT, MAX_TEXT_LEN,
};
pub use number_format::{format_general, NumberFormatSpec, SymbolPosition};
pub use value::{ColumnType, NumberKind, TypedValue};
