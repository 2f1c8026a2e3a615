//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input has no data rows after the header.
    #[error("input has no data rows")]
    EmptyInput,

    /// A coordinate field is not a finite number.
    #[error("line {line}, column {column}: invalid coordinate {value:?}")]
    MalformedRecord {
        line: usize,
        column: usize,
        value: String,
    },

    /// A record is too short to hold a coordinate column.
    #[error("line {line}: missing column {column}")]
    MissingField { line: usize, column: usize },

    /// JSON serialization error.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] gridscan_core::Error),
}
