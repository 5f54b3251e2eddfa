//! Schema commands: local conversion and transformation, remote sync

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use super::Context;
use crate::cli::error::CliError;
use crate::cli::output::{cell, format_changes, format_table, format_tree, id_from_url};
use crate::export::json::{to_json_string, tree_to_json};
use crate::export::write_schema_file;
use crate::import::json::{json_to_tree, node_from_json};
use crate::import::{ImportError, read_schema_file};
use crate::models::SchemaTree;
use crate::transform::{Pipeline, TransformError, Transformation, read_options_file};

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Convert between JSON, YAML and XLSX (formats follow the file extensions)
    Convert(ConvertArgs),
    /// Print the outline of a schema file
    Show(ShowArgs),
    /// Apply a transformation to a schema file
    Transform(TransformArgs),
    /// List schemas on the server
    List,
    /// Download a schema into a file (or stdout as JSON)
    Download(DownloadArgs),
    /// Replace the content of a schema on the server
    Upload(UploadArgs),
    /// Create a schema on the server
    Create(CreateArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Schema file to transform
    #[arg(short, long)]
    pub input: PathBuf,
    /// Where to write the result (defaults to the input file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Print the changes without writing anything
    #[arg(long)]
    pub dry_run: bool,
    #[command(subcommand)]
    pub op: TransformOp,
}

#[derive(Debug, Subcommand)]
pub enum TransformOp {
    /// Replace the options of an enum datapoint from a JSON or CSV file
    SubstituteOptions {
        #[arg(long)]
        id: String,
        #[arg(long)]
        options: PathBuf,
    },
    /// Remove a node and its subtree
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Insert a node read from a JSON file
    Add {
        /// Parent id; omit to add a root
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        node: PathBuf,
        #[arg(long)]
        position: Option<usize>,
    },
    /// Move a node under another parent
    Move {
        #[arg(long)]
        id: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        position: Option<usize>,
    },
    /// Run a JSON script of steps
    Script {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    pub id: u64,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub id: u64,
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub name: String,
    pub file: PathBuf,
}

pub fn run(ctx: &Context, command: &SchemaCommand) -> Result<(), CliError> {
    match command {
        SchemaCommand::Convert(args) => handle_convert(args),
        SchemaCommand::Show(args) => {
            print!("{}", format_tree(&read_schema_file(&args.input)?));
            Ok(())
        }
        SchemaCommand::Transform(args) => handle_transform(args),
        SchemaCommand::List => handle_list(ctx),
        SchemaCommand::Download(args) => handle_download(ctx, args),
        SchemaCommand::Upload(args) => handle_upload(ctx, args),
        SchemaCommand::Create(args) => handle_create(ctx, args),
    }
}

/// Handle the `schema convert` command
pub fn handle_convert(args: &ConvertArgs) -> Result<(), CliError> {
    let tree = read_schema_file(&args.input)?;
    write_schema_file(&tree, &args.output)?;
    println!(
        "Converted {} nodes: {} -> {}",
        tree.len(),
        args.input.display(),
        args.output.display()
    );
    Ok(())
}

/// Handle the `schema transform` command
pub fn handle_transform(args: &TransformArgs) -> Result<(), CliError> {
    let tree = read_schema_file(&args.input)?;
    let pipeline = build_pipeline(&args.op)?;
    let outcome = pipeline.apply(&tree)?;

    print!("{}", format_changes(&outcome.changes));
    if args.dry_run {
        return Ok(());
    }

    let output = args.output.as_deref().unwrap_or(&args.input);
    write_schema_file(&outcome.tree, output)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn build_pipeline(op: &TransformOp) -> Result<Pipeline, CliError> {
    let step = match op {
        TransformOp::SubstituteOptions { id, options } => Transformation::SubstituteOptions {
            target_id: id.clone(),
            options: read_options_file(options)?,
        },
        TransformOp::Remove { id } => Transformation::Remove {
            target_id: id.clone(),
        },
        TransformOp::Add {
            parent,
            node,
            position,
        } => {
            let value: serde_json::Value = serde_json::from_str(&read_text(node)?)
                .map_err(|e| CliError::InvalidArgument(format!("{}: {}", node.display(), e)))?;
            Transformation::Add {
                parent_id: parent.clone(),
                node: node_from_json(&value).map_err(TransformError::from)?,
                position: *position,
            }
        }
        TransformOp::Move {
            id,
            parent,
            position,
        } => Transformation::Move {
            target_id: id.clone(),
            parent_id: parent.clone(),
            position: *position,
        },
        TransformOp::Script { file } => return Ok(Pipeline::from_json_str(&read_text(file)?)?),
    };
    Ok(Pipeline::new().then(step))
}

fn read_text(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))
}

fn handle_list(ctx: &Context) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    let schemas = client.get_schemas()?;
    let rows: Vec<Vec<String>> = schemas
        .iter()
        .map(|schema| {
            let queues = schema
                .get("queues")
                .and_then(|q| q.as_array())
                .map(|urls| {
                    urls.iter()
                        .filter_map(|u| u.as_str())
                        .map(id_from_url)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            vec![
                cell(schema.get("id")),
                cell(schema.get("name")),
                queues,
            ]
        })
        .collect();
    print!("{}", format_table(&["id", "name", "queues"], &rows));
    client.close()?;
    Ok(())
}

fn handle_download(ctx: &Context, args: &DownloadArgs) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    let schema = client.get_schema(args.id)?;
    client.close()?;

    let content = schema
        .get("content")
        .cloned()
        .unwrap_or(serde_json::Value::Array(Vec::new()));
    let tree = json_to_tree(&content).map_err(ImportError::from)?;

    match &args.output {
        Some(path) => {
            write_schema_file(&tree, path)?;
            println!("Schema {} written to {}", args.id, path.display());
        }
        None => println!("{}", to_json_string(&tree)?),
    }
    Ok(())
}

fn handle_upload(ctx: &Context, args: &UploadArgs) -> Result<(), CliError> {
    let tree = read_schema_file(&args.file)?;
    let mut client = ctx.connect()?;
    client.update_schema_content(args.id, &tree_to_json(&tree))?;
    client.close()?;
    println!("Schema {} updated ({} nodes)", args.id, tree.len());
    Ok(())
}

fn handle_create(ctx: &Context, args: &CreateArgs) -> Result<(), CliError> {
    let tree: SchemaTree = read_schema_file(&args.file)?;
    let mut client = ctx.connect()?;
    let schema = client.create_schema(&args.name, &tree_to_json(&tree))?;
    client.close()?;
    println!(
        "{}, {}",
        cell(schema.get("id")),
        cell(schema.get("name"))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::read_schema_file;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"[
        {"id": "header", "label": "Header", "category": "section", "children": [
            {"id": "invoice_id", "label": "Invoice ID", "category": "datapoint", "type": "string"},
            {"id": "currency", "label": "Currency", "category": "datapoint", "type": "enum", "options": []}
        ]}
    ]"#;

    #[test]
    fn test_convert_and_transform_files() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("schema.json");
        std::fs::write(&json_path, SCHEMA).unwrap();

        let xlsx_path = dir.path().join("schema.xlsx");
        handle_convert(&ConvertArgs {
            input: json_path.clone(),
            output: xlsx_path.clone(),
        })
        .unwrap();

        let options_path = dir.path().join("currencies.csv");
        std::fs::write(&options_path, "value,label\neur,Euro\nusd,US Dollar\n").unwrap();

        handle_transform(&TransformArgs {
            input: xlsx_path.clone(),
            output: None,
            dry_run: false,
            op: TransformOp::SubstituteOptions {
                id: "currency".to_string(),
                options: options_path,
            },
        })
        .unwrap();

        let tree = read_schema_file(&xlsx_path).unwrap();
        let options = tree.get("currency").unwrap().options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].label, "US Dollar");
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, SCHEMA).unwrap();

        handle_transform(&TransformArgs {
            input: path.clone(),
            output: None,
            dry_run: true,
            op: TransformOp::Remove {
                id: "invoice_id".to_string(),
            },
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SCHEMA);
    }

    #[test]
    fn test_failed_transform_reports_node() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, SCHEMA).unwrap();

        let err = handle_transform(&TransformArgs {
            input: path,
            output: None,
            dry_run: false,
            op: TransformOp::Remove {
                id: "missing".to_string(),
            },
        })
        .unwrap_err();
        assert!(err.user_message().contains("missing"));
    }
}
