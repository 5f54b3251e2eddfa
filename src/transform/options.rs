//! Option list sources for `substitute-options`
//!
//! Options come either as a JSON array of `{"value", "label"}` objects or as
//! a two-column CSV (`value,label`, header row optional). Order is kept as
//! given.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use super::error::{TransformError, TransformResult};
use crate::models::SchemaOption;

/// Parse options from a JSON array
pub fn options_from_json(value: &Value) -> TransformResult<Vec<SchemaOption>> {
    serde_json::from_value(value.clone()).map_err(|e| TransformError::InvalidOptions {
        source_name: "JSON".to_string(),
        reason: e.to_string(),
    })
}

/// Parse options from CSV records
pub fn options_from_csv<R: Read>(reader: R) -> TransformResult<Vec<SchemaOption>> {
    let invalid = |reason: String| TransformError::InvalidOptions {
        source_name: "CSV".to_string(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut options = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| invalid(e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let value = record.get(0).unwrap_or_default();
        let label = record.get(1).unwrap_or_default();
        if i == 0 && value.eq_ignore_ascii_case("value") && label.eq_ignore_ascii_case("label") {
            continue;
        }
        if record.len() > 2 && record.iter().skip(2).any(|field| !field.is_empty()) {
            return Err(invalid(format!(
                "line {} has more than two columns",
                i + 1
            )));
        }
        if value.is_empty() {
            return Err(invalid(format!("line {} has an empty value", i + 1)));
        }
        options.push(SchemaOption::new(value, label));
    }

    Ok(options)
}

/// Read options from a `.json` or `.csv` file
pub fn read_options_file(path: &Path) -> TransformResult<Vec<SchemaOption>> {
    let io_error = |e: std::io::Error| TransformError::InvalidOptions {
        source_name: path.display().to_string(),
        reason: e.to_string(),
    };
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => {
            let content = std::fs::read_to_string(path).map_err(io_error)?;
            let value: Value =
                serde_json::from_str(&content).map_err(|e| TransformError::InvalidOptions {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            options_from_json(&value)
        }
        Some("csv") => {
            let file = std::fs::File::open(path).map_err(io_error)?;
            options_from_csv(file)
        }
        _ => Err(TransformError::InvalidOptions {
            source_name: path.display().to_string(),
            reason: "expected a .json or .csv file".to_string(),
        }),
    }
}
