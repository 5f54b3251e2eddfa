use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docschema_sdk::cli::CliError;
use docschema_sdk::cli::commands::configure::{ConfigureArgs, handle_configure};
use docschema_sdk::cli::commands::document::{ExportArgs, UploadArgs, handle_export, handle_upload};
use docschema_sdk::cli::commands::objects::{
    ConnectorCommand, HookCommand, QueueCommand, UserCommand, WorkspaceCommand, run_connector,
    run_hook, run_queue, run_user, run_workspace,
};
use docschema_sdk::cli::commands::password::{self, PasswordCommand};
use docschema_sdk::cli::commands::schema::{self, SchemaCommand};
use docschema_sdk::cli::commands::Context;
use docschema_sdk::cli::config::DEFAULT_PROFILE;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docschema", version)]
#[command(about = "Manage extraction schemas and the objects around them")]
struct Cli {
    /// Credential profile to use
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,
    /// Profile file (defaults to $DOCSCHEMA_CONFIG or the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store credentials for a profile
    Configure(ConfigureArgs),
    /// Work with schemas, locally or on the server
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Connector {
        #[command(subcommand)]
        command: ConnectorCommand,
    },
    Hook {
        #[command(subcommand)]
        command: HookCommand,
    },
    Document {
        #[command(subcommand)]
        command: DocumentCommand,
    },
    Password {
        #[command(subcommand)]
        command: PasswordCommand,
    },
    /// Export annotations of a queue
    Export(ExportArgs),
}

#[derive(Debug, Subcommand)]
enum DocumentCommand {
    /// Upload a document into a queue
    Upload(UploadArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(ctx: &Context, command: &Command) -> Result<(), CliError> {
    match command {
        Command::Configure(args) => handle_configure(ctx, args),
        Command::Schema { command } => schema::run(ctx, command),
        Command::Workspace { command } => run_workspace(ctx, command),
        Command::Queue { command } => run_queue(ctx, command),
        Command::User { command } => run_user(ctx, command),
        Command::Connector { command } => run_connector(ctx, command),
        Command::Hook { command } => run_hook(ctx, command),
        Command::Document {
            command: DocumentCommand::Upload(args),
        } => handle_upload(ctx, args),
        Command::Password { command } => password::run(ctx, command),
        Command::Export(args) => handle_export(ctx, args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context {
        config_path: cli.config.clone(),
        profile: cli.profile.clone(),
    };
    match run(&ctx, &cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
