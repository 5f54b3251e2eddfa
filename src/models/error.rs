//! Error types for schema model construction

use thiserror::Error;

use super::node::Category;

/// Raised when a schema tree cannot be built from its input
///
/// Every variant names the offending schema id (or the position of the node
/// when it has no usable id).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaValidationError {
    #[error("Duplicate schema id '{id}'")]
    DuplicateId { id: String },

    #[error("Unknown category '{category}' on node '{id}'")]
    UnknownCategory { id: String, category: String },

    #[error("Option value '{value}' appears more than once in node '{id}'")]
    DuplicateOptionValue { id: String, value: String },

    #[error("Attribute '{attribute}' is not allowed on {category} node '{id}'")]
    IllegalAttribute {
        id: String,
        category: Category,
        attribute: String,
    },

    #[error("Invalid value for attribute '{attribute}' on node '{id}': {reason}")]
    InvalidAttribute {
        id: String,
        attribute: String,
        reason: String,
    },

    #[error("Node '{id}' is missing required attribute '{attribute}'")]
    MissingAttribute { id: String, attribute: String },

    #[error("A {child_category} node ('{child}') cannot be a child of {parent_category} node '{parent}'")]
    IllegalChild {
        parent: String,
        parent_category: Category,
        child: String,
        child_category: Category,
    },

    #[error("A {category} node ('{id}') cannot be nested; it is only allowed at the root")]
    RootOnly { id: String, category: Category },

    #[error("Malformed schema at {location}: {reason}")]
    Malformed { location: String, reason: String },
}

impl SchemaValidationError {
    /// The schema id (or location) the error refers to
    pub fn node_id(&self) -> &str {
        match self {
            SchemaValidationError::DuplicateId { id }
            | SchemaValidationError::UnknownCategory { id, .. }
            | SchemaValidationError::DuplicateOptionValue { id, .. }
            | SchemaValidationError::IllegalAttribute { id, .. }
            | SchemaValidationError::InvalidAttribute { id, .. }
            | SchemaValidationError::MissingAttribute { id, .. }
            | SchemaValidationError::RootOnly { id, .. } => id,
            SchemaValidationError::IllegalChild { child, .. } => child,
            SchemaValidationError::Malformed { location, .. } => location,
        }
    }
}

/// Result type for schema model operations
pub type SchemaResult<T> = Result<T, SchemaValidationError>;
