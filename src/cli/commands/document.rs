//! Document upload and annotation export

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use super::{Context, json_arg};
use crate::api::UploadOptions;
use crate::cli::error::CliError;
use crate::cli::output::cell;
use crate::export::write_atomically;

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub queue_id: u64,
    pub file: PathBuf,
    /// Name sent for the document (defaults to the file's name)
    #[arg(long)]
    pub filename: Option<String>,
    /// Initial values as a JSON object keyed by schema id
    #[arg(long)]
    pub values: Option<String>,
    /// Document metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Json,
    Xml,
    Csv,
    Xlsx,
}

impl ExportFormat {
    fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub queue_id: u64,
    #[arg(short, long = "annotation-id", required = true)]
    pub annotation_ids: Vec<u64>,
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
    /// Defaults to stdout
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
}

/// Handle the `document upload` command
pub fn handle_upload(ctx: &Context, args: &UploadArgs) -> Result<(), CliError> {
    let bytes = std::fs::read(&args.file)
        .map_err(|e| CliError::FileReadError(args.file.clone(), e.to_string()))?;
    let filename = match &args.filename {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CliError::InvalidArgument(format!("{} has no file name", args.file.display()))
            })?,
    };
    let options = UploadOptions {
        values: args.values.as_deref().map(|v| json_arg("values", v)).transpose()?,
        metadata: args
            .metadata
            .as_deref()
            .map(|m| json_arg("metadata", m))
            .transpose()?,
    };

    let mut client = ctx.connect()?;
    let response = client.upload_document_with(args.queue_id, &bytes, &filename, &options)?;
    client.close()?;

    println!(
        "{}, {}",
        cell(response.get("annotation")),
        cell(response.get("document"))
    );
    Ok(())
}

/// Handle the `export` command
pub fn handle_export(ctx: &Context, args: &ExportArgs) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    let data = client.export_data(args.queue_id, &args.annotation_ids, args.format.as_str())?;
    client.close()?;

    match &args.output {
        Some(path) => {
            write_atomically(path, &data)
                .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
            tracing::info!("Exported {} bytes to {}", data.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&data)
                .and_then(|_| stdout.flush())
                .map_err(|e| CliError::FileWriteError(PathBuf::from("<stdout>"), e.to_string()))?;
        }
    }
    Ok(())
}
