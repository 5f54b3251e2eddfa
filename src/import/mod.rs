//! Import functionality
//!
//! Provides readers that build a [`SchemaTree`] from:
//! - JSON (the nested mapping used by the service)
//! - YAML (the same mapping)
//! - XLSX (the tabular form, see [`crate::convert`])

pub mod json;
pub mod xlsx;

use std::path::Path;

use crate::convert::SchemaFormatError;
use crate::models::{SchemaTree, SchemaValidationError};

pub use json::{json_to_nodes, json_to_tree, node_from_json, parse_json_str, parse_yaml_str};
pub use xlsx::{read_xlsx, read_xlsx_bytes};

/// Error during import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid workbook: {0}")]
    Workbook(String),
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
    #[error(transparent)]
    Format(#[from] SchemaFormatError),
    #[error("Unsupported schema file format: {0}")]
    UnsupportedFormat(String),
}

/// On-disk representation of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFileFormat {
    Json,
    Yaml,
    Xlsx,
}

impl SchemaFileFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(SchemaFileFormat::Json),
            "yaml" | "yml" => Some(SchemaFileFormat::Yaml),
            "xlsx" => Some(SchemaFileFormat::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFileFormat::Json => "json",
            SchemaFileFormat::Yaml => "yaml",
            SchemaFileFormat::Xlsx => "xlsx",
        }
    }
}

/// Read a schema file, choosing the reader from the file extension
pub fn read_schema_file(path: &Path) -> Result<SchemaTree, ImportError> {
    let format = SchemaFileFormat::from_path(path)
        .ok_or_else(|| ImportError::UnsupportedFormat(path.display().to_string()))?;
    read_schema_file_as(path, format)
}

/// Read a schema file in an explicit format
pub fn read_schema_file_as(path: &Path, format: SchemaFileFormat) -> Result<SchemaTree, ImportError> {
    tracing::debug!("Reading {} schema from {}", format.as_str(), path.display());
    let tree = match format {
        SchemaFileFormat::Json => parse_json_str(&std::fs::read_to_string(path)?)?,
        SchemaFileFormat::Yaml => parse_yaml_str(&std::fs::read_to_string(path)?)?,
        SchemaFileFormat::Xlsx => read_xlsx(path)?,
    };
    tracing::info!("Loaded schema with {} nodes from {}", tree.len(), path.display());
    Ok(tree)
}
