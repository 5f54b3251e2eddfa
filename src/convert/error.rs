//! Error types for the tabular codec

use thiserror::Error;

use crate::models::SchemaValidationError;

/// Raised when a table cannot be turned into a schema tree
///
/// `path` is the row's id path joined with `/`, which is how the row is
/// identified in the spreadsheet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaFormatError {
    #[error("Rows out of order: row {row} ('{path}') does not follow its parent")]
    RowsOutOfOrder { row: usize, path: String },

    #[error("Row '{path}' is missing required attribute '{attribute}'")]
    MissingAttribute { path: String, attribute: String },

    #[error("Required column '{column}' is missing from the header")]
    MissingColumn { column: String },

    #[error("Unknown column '{column}'")]
    UnknownColumn { column: String },

    #[error("Row '{path}': column '{column}' holds '{value}', which is not a boolean (expected TRUE or FALSE)")]
    InvalidBoolean {
        path: String,
        column: String,
        value: String,
    },

    #[error("Row '{path}': column '{column}' holds '{value}', which is not a valid number")]
    InvalidNumber {
        path: String,
        column: String,
        value: String,
    },

    #[error("Row '{path}': invalid value in column '{column}': {reason}")]
    InvalidValue {
        path: String,
        column: String,
        reason: String,
    },

    #[error("Row '{path}': id '{id}' does not match the last path element")]
    IdMismatch { path: String, id: String },

    #[error("Row {row} has an empty path")]
    EmptyPath { row: usize },

    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
}

/// Result type for the tabular codec
pub type FormatResult<T> = Result<T, SchemaFormatError>;
