//! FILENAME: core/table-engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Invalid table configuration: {0}")]
    InvalidConfig(String),

    #[error("Formatter for column '{column}' does not compile: {message}")]
    Formatter { column: String, message: String },

    #[error("Filter '{source_text}' does not compile: {message}")]
    Filter { source_text: String, message: String },

    #[error("Formatter for column '{column}' failed: {message}")]
    FormatFailed { column: String, message: String },
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::InvalidConfig(err.to_string())
    }
}

pub type TableResult<T> = Result<T, TableError>;
