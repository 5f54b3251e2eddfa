//! DocSchema SDK - schema tooling and API client for a document-extraction service
//!
//! Provides:
//! - An in-memory schema tree model with structural validation
//! - JSON and XLSX codecs for schema files
//! - A transformation engine (substitute options, remove, add, move)
//! - Lookups by schema id in annotation content
//! - A paginated, authenticated API client (feature `api-backend`)
//! - The `docschema` command line tool (feature `cli`)

pub mod content;
pub mod convert;
pub mod export;
pub mod import;
pub mod models;
pub mod transform;
pub mod validation;

#[cfg(feature = "api-backend")]
pub mod api;
pub mod cli;

// Re-export commonly used types
pub use convert::{SchemaFormatError, TabularRow, rows_to_tree, tree_to_rows};
pub use export::{ExportError, write_schema_file};
pub use import::{ImportError, read_schema_file};
pub use models::{
    Category, DataType, NodeKind, SchemaNode, SchemaOption, SchemaTree, SchemaValidationError,
};
pub use transform::{Pipeline, TransformError, Transformation};

#[cfg(feature = "api-backend")]
pub use api::{ApiClient, ApiError, ClientConfig, PaginatedResult, Sideload};
