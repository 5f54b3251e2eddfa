//! Export functionality
//!
//! Provides writers that render a [`SchemaTree`] as:
//! - JSON (the nested mapping used by the service)
//! - YAML (the same mapping)
//! - XLSX (the tabular form, see [`crate::convert`])

pub mod json;
pub mod xlsx;

use std::io::Write;
use std::path::Path;

use crate::import::SchemaFileFormat;
use crate::models::SchemaTree;

pub use json::{node_to_json, to_json_string, to_yaml_string, tree_to_json};
pub use xlsx::write_xlsx;

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Workbook error: {0}")]
    Workbook(String),
    #[error("Unsupported schema file format: {0}")]
    UnsupportedFormat(String),
}

/// Render a tree in the given format
pub fn render(tree: &SchemaTree, format: SchemaFileFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        SchemaFileFormat::Json => Ok(to_json_string(tree)?.into_bytes()),
        SchemaFileFormat::Yaml => Ok(to_yaml_string(tree)?.into_bytes()),
        SchemaFileFormat::Xlsx => write_xlsx(tree),
    }
}

/// Write a tree to `path`, choosing the format from the extension
///
/// The file is rendered in full and then moved into place, so a failed
/// export never leaves a truncated file behind.
pub fn write_schema_file(tree: &SchemaTree, path: &Path) -> Result<(), ExportError> {
    let format = SchemaFileFormat::from_path(path)
        .ok_or_else(|| ExportError::UnsupportedFormat(path.display().to_string()))?;
    let bytes = render(tree, format)?;
    write_atomically(path, &bytes)?;
    tracing::info!(
        "Wrote {} schema with {} nodes to {}",
        format.as_str(),
        tree.len(),
        path.display()
    );
    Ok(())
}

/// Replace `path` with `bytes` via a sibling temporary file
pub fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schema".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = (|| {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}
