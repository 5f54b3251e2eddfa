//! Workspace, queue, user, connector and hook commands

use std::io::BufRead;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use serde_json::{Map, Value, json};

use super::{Context, url_of};
use crate::api::{
    ApiClient, HookUpdate, NewConnector, NewHook, NewInbox, NewQueue, NewUser, Query, QueueFilter,
    Resource,
};
use crate::cli::error::CliError;
use crate::cli::output::{cell, format_objects, format_table, id_from_url};
use crate::export::json::tree_to_json;
use crate::import::read_schema_file;

#[derive(Debug, Subcommand)]
pub enum WorkspaceCommand {
    List,
    Create {
        name: String,
        /// Defaults to the organization of the logged-in user
        #[arg(short = 'o', long)]
        organization_id: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    List,
    /// Create a queue with its own schema, and an inbox when an email is given
    Create(QueueCreateArgs),
}

#[derive(Debug, Args)]
pub struct QueueCreateArgs {
    pub name: String,
    /// Schema file (JSON, YAML or XLSX)
    #[arg(short, long)]
    pub schema_file: PathBuf,
    /// Defaults to the only workspace
    #[arg(short, long)]
    pub workspace_id: Option<u64>,
    #[arg(long)]
    pub email_prefix: Option<String>,
    #[arg(long)]
    pub bounce_email: Option<String>,
    #[arg(long)]
    pub connector_id: Option<u64>,
    #[arg(long)]
    pub hook_id: Vec<u64>,
    #[arg(short, long)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Group {
    Annotator,
    Admin,
    Manager,
    Viewer,
}

impl Group {
    fn as_str(&self) -> &'static str {
        match self {
            Group::Annotator => "annotator",
            Group::Admin => "admin",
            Group::Manager => "manager",
            Group::Viewer => "viewer",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    List,
    Create(UserCreateArgs),
}

#[derive(Debug, Args)]
pub struct UserCreateArgs {
    pub username: String,
    #[arg(short, long)]
    pub password: String,
    #[arg(short, long = "queue-id")]
    pub queue_ids: Vec<u64>,
    #[arg(short = 'o', long)]
    pub organization_id: Option<u64>,
    #[arg(short, long, value_enum, default_value_t = Group::Annotator)]
    pub group: Group,
    #[arg(short, long, default_value = "en")]
    pub locale: String,
}

#[derive(Debug, Subcommand)]
pub enum ConnectorCommand {
    List,
    Create(ConnectorCreateArgs),
}

#[derive(Debug, Args)]
pub struct ConnectorCreateArgs {
    pub name: String,
    #[arg(short = 'u', long)]
    pub service_url: String,
    /// Defaults to the only queue
    #[arg(short, long = "queue-id")]
    pub queue_ids: Vec<u64>,
    #[arg(short = 't', long)]
    pub auth_token: Option<String>,
    #[arg(short, long)]
    pub params: Option<String>,
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    pub asynchronous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookType {
    Webhook,
    Function,
}

#[derive(Debug, Subcommand)]
pub enum HookCommand {
    List,
    Create(HookCreateArgs),
    /// Update the given fields of a hook
    Change(HookChangeArgs),
    /// Delete a hook
    Delete {
        id: u64,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

impl HookType {
    fn as_str(&self) -> &'static str {
        match self {
            HookType::Webhook => "webhook",
            HookType::Function => "function",
        }
    }
}

#[derive(Debug, Args)]
pub struct HookCreateArgs {
    pub name: String,
    #[arg(short = 't', long, value_enum)]
    pub hook_type: HookType,
    /// Defaults to the only queue
    #[arg(short, long = "queue-id")]
    pub queue_ids: Vec<u64>,
    #[arg(short, long, required = true)]
    pub events: Vec<String>,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub active: bool,
    #[arg(short, long)]
    pub sideload: Vec<String>,
    /// Webhook endpoint
    #[arg(long)]
    pub config_url: Option<String>,
    #[arg(long)]
    pub config_secret: Option<String>,
    #[arg(long)]
    pub config_insecure_ssl: Option<bool>,
    /// File with the function source code
    #[arg(long)]
    pub config_code: Option<PathBuf>,
    #[arg(long)]
    pub config_runtime: Option<String>,
}

#[derive(Debug, Default, Args)]
pub struct HookChangeArgs {
    pub id: u64,
    #[arg(short, long = "queue-id")]
    pub queue_ids: Vec<u64>,
    #[arg(short, long)]
    pub name: Option<String>,
    #[arg(short = 't', long, value_enum)]
    pub hook_type: Option<HookType>,
    #[arg(short, long)]
    pub events: Vec<String>,
    #[arg(long)]
    pub active: Option<bool>,
    #[arg(short, long)]
    pub sideload: Vec<String>,
    #[arg(long)]
    pub config_url: Option<String>,
    #[arg(long)]
    pub config_secret: Option<String>,
    #[arg(long)]
    pub config_insecure_ssl: Option<bool>,
    #[arg(long)]
    pub config_code: Option<PathBuf>,
    #[arg(long)]
    pub config_runtime: Option<String>,
}

pub fn run_workspace(ctx: &Context, command: &WorkspaceCommand) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    match command {
        WorkspaceCommand::List => {
            let workspaces = client.get_workspaces(None)?;
            let rows: Vec<Vec<String>> = workspaces
                .iter()
                .map(|w| vec![cell(w.get("id")), cell(w.get("name")), ids_of(w.get("queues"))])
                .collect();
            print!("{}", format_table(&["id", "name", "queues"], &rows));
        }
        WorkspaceCommand::Create {
            name,
            organization_id,
        } => {
            let organization = client.get_organization(*organization_id)?;
            let workspace = client.create_workspace(name, &url_of(&organization)?, None)?;
            println!("{}", cell(workspace.get("id")));
        }
    }
    client.close()?;
    Ok(())
}

pub fn run_queue(ctx: &Context, command: &QueueCommand) -> Result<(), CliError> {
    match command {
        QueueCommand::List => {
            let mut client = ctx.connect()?;
            let queues = client.get_queues(&QueueFilter::default(), &[])?;
            client.close()?;
            let rows: Vec<Vec<String>> = queues
                .iter()
                .map(|q| {
                    vec![
                        cell(q.get("id")),
                        cell(q.get("name")),
                        ids_of(q.get("workspace")),
                        ids_of(q.get("schema")),
                        ids_of(q.get("inbox")),
                        ids_of(q.get("hooks")),
                    ]
                })
                .collect();
            print!(
                "{}",
                format_table(&["id", "name", "workspace", "schema", "inbox", "hooks"], &rows)
            );
            Ok(())
        }
        QueueCommand::Create(args) => handle_queue_create(ctx, args),
    }
}

/// Handle the `queue create` command
pub fn handle_queue_create(ctx: &Context, args: &QueueCreateArgs) -> Result<(), CliError> {
    let tree = read_schema_file(&args.schema_file)?;
    let mut client = ctx.connect()?;

    let workspace_url = url_of(&client.get_workspace(args.workspace_id)?)?;
    let schema = client.create_schema(&format!("{} schema", args.name), &tree_to_json(&tree))?;

    let mut queue = NewQueue::new(&args.name, workspace_url, url_of(&schema)?);
    if let Some(id) = args.connector_id {
        queue = queue.with_connector(url_of(
            &client.get(&Resource::Connectors.item(id), &Query::new())?,
        )?);
    }
    if !args.hook_id.is_empty() {
        let mut hooks = Vec::new();
        for id in &args.hook_id {
            hooks.push(url_of(&client.get(&Resource::Hooks.item(*id), &Query::new())?)?);
        }
        queue = queue.with_hooks(hooks);
    }
    if let Some(locale) = &args.locale {
        queue = queue.with_locale(locale);
    }
    let queue = client.create_queue(&queue)?;

    let mut inbox_email = String::new();
    if args.email_prefix.is_some() || args.bounce_email.is_some() {
        let inbox = client.create_inbox(&NewInbox {
            name: format!("{} inbox", args.name),
            queue_url: url_of(&queue)?,
            email_prefix: args.email_prefix.clone(),
            email: None,
            bounce_email: args.bounce_email.clone(),
        })?;
        inbox_email = cell(inbox.get("email"));
    }
    client.close()?;

    println!("{}, {}", cell(queue.get("id")), inbox_email);
    Ok(())
}

pub fn run_user(ctx: &Context, command: &UserCommand) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    match command {
        UserCommand::List => {
            let users = client.get_users(None, Some(true))?;
            let users = client.sideload(users, &[Resource::Groups.sideload()])?;
            let rows: Vec<Vec<String>> = users
                .iter()
                .map(|u| {
                    let group_names = u
                        .get("groups")
                        .and_then(Value::as_array)
                        .map(|gs| {
                            gs.iter()
                                .map(|g| cell(g.get("name")))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    vec![
                        cell(u.get("id")),
                        cell(u.get("username")),
                        group_names,
                        ids_of(u.get("queues")),
                    ]
                })
                .collect();
            print!("{}", format_table(&["id", "username", "groups", "queues"], &rows));
        }
        UserCommand::Create(args) => {
            let organization = client.get_organization(args.organization_id)?;
            let queue_urls = queue_urls(&mut client, &args.queue_ids, false)?;
            let user = client.create_user(&NewUser {
                username: args.username.clone(),
                organization_url: url_of(&organization)?,
                queue_urls,
                password: Some(args.password.clone()),
                group: Some(args.group.as_str().to_string()),
                locale: args.locale.clone(),
            })?;
            println!("{}", cell(user.get("id")));
        }
    }
    client.close()?;
    Ok(())
}

pub fn run_connector(ctx: &Context, command: &ConnectorCommand) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    match command {
        ConnectorCommand::List => {
            let connectors = client.get_connectors()?;
            print!(
                "{}",
                format_objects(
                    &connectors,
                    &["id", "name", "service_url", "params", "asynchronous"]
                )
            );
        }
        ConnectorCommand::Create(args) => {
            let mut connector = NewConnector::new(
                &args.name,
                queue_urls(&mut client, &args.queue_ids, true)?,
                &args.service_url,
            );
            connector.authorization_token = args.auth_token.clone();
            connector.params = args.params.clone();
            connector.asynchronous = args.asynchronous;
            let created = client.create_connector(&connector)?;
            println!(
                "{}, {}, {}",
                cell(created.get("id")),
                cell(created.get("name")),
                cell(created.get("authorization_token"))
            );
        }
    }
    client.close()?;
    Ok(())
}

pub fn run_hook(ctx: &Context, command: &HookCommand) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    match command {
        HookCommand::List => {
            let hooks = client.get_hooks(&Query::new())?;
            let hooks = client.sideload(hooks, &[Resource::Queues.sideload()])?;
            let rows: Vec<Vec<String>> = hooks
                .iter()
                .map(|h| {
                    let queue_ids = h
                        .get("queues")
                        .and_then(Value::as_array)
                        .map(|qs| {
                            qs.iter()
                                .map(|q| cell(q.get("id")))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    vec![
                        cell(h.get("id")),
                        cell(h.get("name")),
                        cell(h.get("events")),
                        queue_ids,
                        cell(h.get("active")),
                        cell(h.get("sideload")),
                    ]
                })
                .collect();
            print!(
                "{}",
                format_table(&["id", "name", "events", "queues", "active", "sideload"], &rows)
            );
        }
        HookCommand::Create(args) => {
            let config = hook_config(args)?;
            let mut hook = NewHook::new(&args.name, args.hook_type.as_str(), config);
            hook.queues = queue_urls(&mut client, &args.queue_ids, true)?;
            hook.active = args.active;
            hook.events = args.events.clone();
            hook.sideload = args.sideload.clone();
            let created = client.create_hook(&hook)?;
            println!(
                "{}, {}, {}",
                cell(created.get("id")),
                cell(created.get("name")),
                cell(created.get("events"))
            );
        }
        HookCommand::Change(args) => {
            let mut update = hook_update(args)?;
            if update.is_empty() && args.queue_ids.is_empty() {
                tracing::info!("Nothing to change on hook {}", args.id);
            } else {
                if !args.queue_ids.is_empty() {
                    update.queues = Some(queue_urls(&mut client, &args.queue_ids, false)?);
                }
                client.update_hook(args.id, &update)?;
            }
        }
        HookCommand::Delete { id, yes } => {
            if !yes
                && !confirm("This will delete the hook deployed on the queue. Do you want to continue?")?
            {
                return Err(CliError::InvalidArgument("Aborted".to_string()));
            }
            let url = format!("{}/{}", client.api_url(), Resource::Hooks.item(*id));
            let report = client.delete_objects("hook", &[(id.to_string(), url)])?;
            for (id, err) in &report.failed {
                eprintln!("Deleting hook {} caused \"{}\".", id, err);
            }
        }
    }
    client.close()?;
    Ok(())
}

/// Fields of a hook update from the change flags, without the queues
///
/// Only flags that were given are sent; `--config-*` flags are collected into
/// a partial `config`.
pub fn hook_update(args: &HookChangeArgs) -> Result<HookUpdate, CliError> {
    let mut config = Map::new();
    if let Some(url) = &args.config_url {
        config.insert("url".to_string(), json!(url));
    }
    if let Some(secret) = &args.config_secret {
        config.insert("secret".to_string(), json!(secret));
    }
    if let Some(insecure) = args.config_insecure_ssl {
        config.insert("insecure_ssl".to_string(), json!(insecure));
    }
    if let Some(runtime) = &args.config_runtime {
        config.insert("runtime".to_string(), json!(runtime));
    }
    if let Some(code_path) = &args.config_code {
        let code = std::fs::read_to_string(code_path)
            .map_err(|e| CliError::FileReadError(code_path.clone(), e.to_string()))?;
        config.insert("code".to_string(), json!(code));
    }

    let non_empty = |items: &Vec<String>| (!items.is_empty()).then(|| items.clone());
    Ok(HookUpdate {
        name: args.name.clone(),
        hook_type: args.hook_type.map(|t| t.as_str().to_string()),
        queues: None,
        active: args.active,
        events: non_empty(&args.events),
        sideload: non_empty(&args.sideload),
        config: (!config.is_empty()).then_some(Value::Object(config)),
    })
}

/// Ask a yes/no question on stderr; anything but `y`/`yes` declines
fn confirm(question: &str) -> Result<bool, CliError> {
    eprint!("{} [y/N]: ", question);
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to read stdin: {}", e)))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Hook `config` from the `--config-*` flags
///
/// Webhooks need a URL, functions need a runtime and code; flags of the
/// other type are rejected.
pub fn hook_config(args: &HookCreateArgs) -> Result<Value, CliError> {
    let mut config = Map::new();
    match args.hook_type {
        HookType::Webhook => {
            if args.config_code.is_some() || args.config_runtime.is_some() {
                return Err(CliError::InvalidArgument(
                    "--config-code and --config-runtime cannot be used for webhooks".to_string(),
                ));
            }
            let url = args.config_url.as_ref().ok_or_else(|| {
                CliError::InvalidArgument("--config-url is required for webhooks".to_string())
            })?;
            config.insert("url".to_string(), json!(url));
            if let Some(secret) = &args.config_secret {
                config.insert("secret".to_string(), json!(secret));
            }
            if let Some(insecure) = args.config_insecure_ssl {
                config.insert("insecure_ssl".to_string(), json!(insecure));
            }
        }
        HookType::Function => {
            if args.config_url.is_some()
                || args.config_secret.is_some()
                || args.config_insecure_ssl.is_some()
            {
                return Err(CliError::InvalidArgument(
                    "--config-url, --config-secret and --config-insecure-ssl cannot be used for functions"
                        .to_string(),
                ));
            }
            let (Some(runtime), Some(code_path)) = (&args.config_runtime, &args.config_code)
            else {
                return Err(CliError::InvalidArgument(
                    "--config-runtime and --config-code are required for functions".to_string(),
                ));
            };
            let code = std::fs::read_to_string(code_path)
                .map_err(|e| CliError::FileReadError(code_path.clone(), e.to_string()))?;
            config.insert("runtime".to_string(), json!(runtime));
            config.insert("code".to_string(), json!(code));
        }
    }
    Ok(Value::Object(config))
}

/// URLs of the given queues; with `default_single`, no ids means the only queue
fn queue_urls(
    client: &mut ApiClient,
    ids: &[u64],
    default_single: bool,
) -> Result<Vec<String>, CliError> {
    if ids.is_empty() {
        return if default_single {
            Ok(vec![url_of(&client.get_queue(None)?)?])
        } else {
            Ok(Vec::new())
        };
    }
    ids.iter()
        .map(|id| url_of(&client.get_queue(Some(*id))?))
        .collect()
}

/// Ids from one object URL or a list of them
fn ids_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(url)) => id_from_url(url).to_string(),
        Some(Value::Array(urls)) => urls
            .iter()
            .filter_map(Value::as_str)
            .map(id_from_url)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook_args(hook_type: HookType) -> HookCreateArgs {
        HookCreateArgs {
            name: "Validate".to_string(),
            hook_type,
            queue_ids: Vec::new(),
            events: vec!["annotation_content.initialize".to_string()],
            active: true,
            sideload: Vec::new(),
            config_url: None,
            config_secret: None,
            config_insecure_ssl: None,
            config_code: None,
            config_runtime: None,
        }
    }

    #[test]
    fn test_webhook_config() {
        let mut args = hook_args(HookType::Webhook);
        assert!(hook_config(&args).is_err());

        args.config_url = Some("https://hook.test".to_string());
        args.config_insecure_ssl = Some(false);
        assert_eq!(
            hook_config(&args).unwrap(),
            json!({"url": "https://hook.test", "insecure_ssl": false})
        );

        args.config_runtime = Some("python3.12".to_string());
        assert!(matches!(hook_config(&args), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_function_config_reads_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let code = dir.path().join("hook.py");
        std::fs::write(&code, "def handler(payload):\n    return {}\n").unwrap();

        let mut args = hook_args(HookType::Function);
        args.config_runtime = Some("python3.12".to_string());
        args.config_code = Some(code);
        let config = hook_config(&args).unwrap();
        assert_eq!(config["runtime"], "python3.12");
        assert!(config["code"].as_str().unwrap().starts_with("def handler"));
    }

    #[test]
    fn test_hook_update_from_given_flags_only() {
        let args = HookChangeArgs {
            id: 12,
            ..Default::default()
        };
        assert!(hook_update(&args).unwrap().is_empty());

        let args = HookChangeArgs {
            id: 12,
            hook_type: Some(HookType::Webhook),
            active: Some(false),
            events: vec!["annotation_status".to_string()],
            config_url: Some("https://hook.test/v2".to_string()),
            ..Default::default()
        };
        let update = hook_update(&args).unwrap();
        assert_eq!(update.hook_type.as_deref(), Some("webhook"));
        assert_eq!(update.active, Some(false));
        assert_eq!(update.events, Some(vec!["annotation_status".to_string()]));
        assert_eq!(update.config, Some(json!({"url": "https://hook.test/v2"})));
        assert_eq!(update.name, None);
        assert_eq!(update.sideload, None);
    }

    #[test]
    fn test_hook_update_reads_code_file() {
        let args = HookChangeArgs {
            id: 1,
            config_code: Some(PathBuf::from("/nonexistent/hook.py")),
            ..Default::default()
        };
        assert!(matches!(hook_update(&args), Err(CliError::FileReadError(..))));
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_ids_of() {
        assert_eq!(ids_of(Some(&json!("https://x/v1/schemas/9"))), "9");
        assert_eq!(
            ids_of(Some(&json!(["https://x/v1/hooks/1", "https://x/v1/hooks/2"]))),
            "1, 2"
        );
        assert_eq!(ids_of(None), "");
    }
}
