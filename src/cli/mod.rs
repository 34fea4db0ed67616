use std::str::FromStr;

use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    api::ApiError,
    bootstrap::{BootstrapError, LOAD_FAILURE_MESSAGE},
    executor::{Action, ActionOutcome, MutationError},
    projection::parse_ticket_id,
    session::Session,
    settings::Settings,
    types::{FilterMode, TicketId},
    views::{DetailModel, ListModel, TicketDetail},
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// List tickets, optionally filtered by completion.
    List(ListArgs),
    /// Show one ticket.
    Show(TicketArgs),
    /// Create a ticket.
    Add(AddArgs),
    /// Set the assignee of a ticket. An empty or zero user id unassigns.
    Assign(AssignArgs),
    Unassign(TicketArgs),
    /// Flip the completion flag of a ticket.
    Toggle(TicketArgs),
    Complete(TicketArgs),
    Incomplete(TicketArgs),
    /// List users that tickets can be assigned to.
    Users,
    /// Print the effective settings, optionally writing them to the config file.
    Config(ConfigArgs),
}

impl RootCommand {
    fn name(&self) -> &'static str {
        match self {
            RootCommand::List(_) => "list",
            RootCommand::Show(_) => "show",
            RootCommand::Add(_) => "add",
            RootCommand::Assign(_) => "assign",
            RootCommand::Unassign(_) => "unassign",
            RootCommand::Toggle(_) => "toggle",
            RootCommand::Complete(_) => "complete",
            RootCommand::Incomplete(_) => "incomplete",
            RootCommand::Users => "users",
            RootCommand::Config(_) => "config",
        }
    }
}

impl Default for RootCommand {
    fn default() -> Self {
        RootCommand::List(ListArgs { filter: None })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    #[arg(long, value_name = "all|completed|incomplete")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Persist the effective settings, including --api-url, to the config file.
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TicketArgs {
    #[arg(value_name = "TICKET_ID")]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(value_name = "DESCRIPTION")]
    pub description: String,
}

#[derive(Debug, Clone, Args)]
pub struct AssignArgs {
    #[arg(value_name = "TICKET_ID")]
    pub id: String,

    #[arg(value_name = "USER_ID", default_value = "")]
    pub user: String,
}

pub async fn run(settings: &Settings, command: RootCommand, json_output: bool, quiet: bool) -> i32 {
    let result = match command {
        RootCommand::Config(args) => config_command(settings, args.save),
        command => match connect(settings).await {
            Ok(session) => execute(&session, settings.filter_mode(), command).await,
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

#[derive(Debug)]
struct CommandOutput {
    command: &'static str,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

async fn connect(settings: &Settings) -> CliResult<Session> {
    let session = Session::from_settings(settings).map_err(config_error)?;
    session.load().await.map_err(bootstrap_error)?;
    info!(
        tickets = session.store().tickets().len(),
        users = session.store().users().len(),
        "session ready"
    );
    Ok(session)
}

async fn execute(
    session: &Session,
    default_filter: FilterMode,
    command: RootCommand,
) -> CliResult<CommandOutput> {
    let name = command.name();
    match command {
        RootCommand::List(args) => {
            let filter = match args.filter.as_deref() {
                Some(raw) => parse_filter(raw)?,
                None => default_filter,
            };
            let model = session.list_view(filter).model();
            Ok(CommandOutput {
                command: name,
                text: render_list(&model),
                data: to_value(&model)?,
            })
        }
        RootCommand::Show(args) => {
            let detail = load_detail(session, &args.id)?;
            Ok(detail_output(name, detail))
        }
        RootCommand::Add(args) => {
            let view = session.list_view(default_filter);
            view.set_draft(args.description);
            let ticket = view
                .submit()
                .await
                .map_err(mutation_error)?
                .ok_or_else(|| mutation_error(MutationError::EmptyDescription))?;
            Ok(CommandOutput {
                command: name,
                text: format!("created ticket #{} - {}", ticket.id, ticket.description),
                data: json!({ "ticket": ticket }),
            })
        }
        RootCommand::Assign(args) => {
            let view = session.detail_view(args.id.as_str());
            view.select_assignee(&args.user)
                .await
                .map_err(mutation_error)?
                .ok_or_else(|| ticket_not_found(&args.id))?;
            let detail = load_detail(session, &args.id)?;
            Ok(detail_output(name, detail))
        }
        RootCommand::Toggle(args) => {
            let view = session.detail_view(args.id.as_str());
            view.toggle()
                .await
                .map_err(mutation_error)?
                .ok_or_else(|| ticket_not_found(&args.id))?;
            let detail = load_detail(session, &args.id)?;
            Ok(detail_output(name, detail))
        }
        RootCommand::Unassign(args) => {
            let id = require_ticket_id(&args.id)?;
            dispatch(session, Action::Unassign(id)).await?;
            Ok(detail_output(name, load_detail(session, &args.id)?))
        }
        RootCommand::Complete(args) => {
            let id = require_ticket_id(&args.id)?;
            dispatch(session, Action::Complete(id)).await?;
            Ok(detail_output(name, load_detail(session, &args.id)?))
        }
        RootCommand::Incomplete(args) => {
            let id = require_ticket_id(&args.id)?;
            dispatch(session, Action::Incomplete(id)).await?;
            Ok(detail_output(name, load_detail(session, &args.id)?))
        }
        RootCommand::Users => {
            let users = session.store().users();
            let text = users
                .iter()
                .map(|user| format!("{}\t{}", user.id, user.name))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandOutput {
                command: name,
                data: json!({ "users": users }),
                text,
            })
        }
        RootCommand::Config(_) => Err(CliError {
            exit_code: 2,
            code: "INVALID_COMMAND",
            message: "config does not run against a loaded session".to_string(),
            details: None,
        }),
    }
}

fn config_command(settings: &Settings, save: bool) -> CliResult<CommandOutput> {
    let path = Settings::config_path();
    if save {
        settings.save().map_err(|err| runtime_error(format!("{err:#}")))?;
        info!(path = ?path, "settings saved");
    }

    let rendered = toml::to_string_pretty(settings).map_err(runtime_error)?;
    let mut text = rendered.trim_end().to_string();
    if let (true, Some(path)) = (save, path.as_ref()) {
        text.push_str(&format!("\nsaved to {}", path.display()));
    }
    Ok(CommandOutput {
        command: "config",
        data: json!({
            "settings": settings,
            "path": path,
            "saved": save,
        }),
        text,
    })
}

async fn dispatch(session: &Session, action: Action) -> CliResult<ActionOutcome> {
    session.dispatch(action).wait().await.map_err(mutation_error)
}

fn parse_filter(raw: &str) -> CliResult<FilterMode> {
    FilterMode::from_str(raw).map_err(|()| CliError {
        exit_code: 2,
        code: "INVALID_FILTER",
        message: format!("unknown filter '{raw}' (expected all, completed or incomplete)"),
        details: None,
    })
}

fn require_ticket_id(raw: &str) -> CliResult<TicketId> {
    parse_ticket_id(raw).ok_or_else(|| ticket_not_found(raw))
}

fn load_detail(session: &Session, raw_id: &str) -> CliResult<TicketDetail> {
    match session.detail_view(raw_id).model() {
        DetailModel::Ticket(detail) => Ok(detail),
        DetailModel::NotFound { .. } => Err(ticket_not_found(raw_id)),
        DetailModel::Loading => Err(runtime_error("session data is still loading")),
        DetailModel::LoadFailed { message } => Err(CliError {
            exit_code: 6,
            code: "BOOTSTRAP_FAILED",
            message,
            details: None,
        }),
    }
}

fn detail_output(command: &'static str, detail: TicketDetail) -> CommandOutput {
    let text = render_detail(&detail);
    CommandOutput {
        command,
        data: json!({ "ticket": detail }),
        text,
    }
}

fn render_list(model: &ListModel) -> String {
    let mut lines = vec![model.title.clone()];
    if let Some(message) = model.empty_message.as_deref() {
        lines.push(message.to_string());
    }
    lines.extend(model.rows.iter().map(|row| {
        format!(
            "{}  [{}]  {}",
            row.title, row.toggle_label, row.assignee_label
        )
    }));
    lines.join("\n")
}

fn render_detail(detail: &TicketDetail) -> String {
    [
        detail.heading.clone(),
        detail.description.clone(),
        format!("Status: {}", detail.status_label),
        format!("Assignee: {}", detail.assignee_name),
    ]
    .join("\n")
}

fn to_value<T: serde::Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value).map_err(runtime_error)
}

fn ticket_not_found(raw_id: &str) -> CliError {
    CliError {
        exit_code: 3,
        code: "TICKET_NOT_FOUND",
        message: format!("ticket '{}' not found", raw_id.trim()),
        details: None,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn config_error(err: ApiError) -> CliError {
    CliError {
        exit_code: 2,
        code: "INVALID_CONFIG",
        message: err.to_string(),
        details: None,
    }
}

fn bootstrap_error(err: BootstrapError) -> CliError {
    CliError {
        exit_code: 6,
        code: "BOOTSTRAP_FAILED",
        message: LOAD_FAILURE_MESSAGE.to_string(),
        details: Some(json!({ "cause": err.to_string() })),
    }
}

fn mutation_error(err: MutationError) -> CliError {
    match err {
        MutationError::TicketNotFound(id) => ticket_not_found(&id.to_string()),
        MutationError::EmptyDescription => CliError {
            exit_code: 2,
            code: "EMPTY_DESCRIPTION",
            message: err.to_string(),
            details: None,
        },
        MutationError::Busy { ticket_id, status } => CliError {
            exit_code: 4,
            code: "TICKET_BUSY",
            message: err.to_string(),
            details: Some(json!({ "ticket_id": ticket_id, "status": status })),
        },
        MutationError::Remote { kind, ref source } => CliError {
            exit_code: 5,
            code: "REMOTE_ERROR",
            details: Some(json!({
                "operation": kind.as_str(),
                "http_status": source.status_code(),
            })),
            message: err.to_string(),
        },
        MutationError::Interrupted(_) => runtime_error(err),
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}
