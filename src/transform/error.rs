//! Error types for schema transformations

use thiserror::Error;

use crate::models::{Category, SchemaValidationError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Node '{id}' not found")]
    NodeNotFound { id: String },

    #[error("Schema id '{id}' already exists in the tree")]
    DuplicateId { id: String },

    #[error("Node '{id}' ({category}) is not supported here: {reason}")]
    UnsupportedNodeKind {
        id: String,
        category: Category,
        reason: String,
    },

    #[error("Option value '{value}' appears more than once in the replacement for '{id}'")]
    DuplicateOptionValue { id: String, value: String },

    #[error("Position {position} is out of range for '{parent}' with {len} children")]
    PositionOutOfRange {
        parent: String,
        position: usize,
        len: usize,
    },

    #[error("Cannot move '{id}' into its own subtree ('{parent}')")]
    MoveIntoDescendant { id: String, parent: String },

    #[error("Invalid options from {source_name}: {reason}")]
    InvalidOptions { source_name: String, reason: String },

    #[error("Invalid transformation script at step {step}: {reason}")]
    InvalidScript { step: usize, reason: String },

    #[error("Step {step} failed: {source}")]
    AtStep {
        step: usize,
        #[source]
        source: Box<TransformError>,
    },

    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
}

impl TransformError {
    /// The error without any step wrapper
    pub fn root_cause(&self) -> &TransformError {
        match self {
            TransformError::AtStep { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type TransformResult<T> = Result<T, TransformError>;
