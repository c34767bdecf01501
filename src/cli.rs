use crate::application::commands::{
    AppState, clear_api_key_impl, create_backlog_item_impl, create_block_impl, create_task_impl,
    daily_log_impl, delete_backlog_item_impl, delete_block_impl, delete_task_impl,
    delete_template_impl, instantiate_template_impl, list_backlog_impl, list_blocks_impl,
    list_tasks_impl, list_template_tasks_impl, list_templates_impl, move_block_impl,
    save_block_as_template_impl, set_api_key_impl, toggle_task_impl, update_task_impl,
};
use crate::domain::models::RecordId;
use crate::domain::time_format::format_time;
use crate::infrastructure::config::BackendKind;
use crate::infrastructure::error::InfraError;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dayboard",
    version,
    about = "Day planner board: blocks, tasks, templates and backlog"
)]
pub struct Cli {
    /// Directory holding config/, state/ and logs/ (defaults to the current directory).
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Overrides the backend from config/app.json.
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Blocks {
        #[command(subcommand)]
        action: BlockCommand,
    },
    Tasks {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Timed tasks of a day, earliest first.
    Log {
        #[arg(long)]
        date: Option<String>,
    },
    Library {
        #[command(subcommand)]
        action: LibraryCommand,
    },
    Backlog {
        #[command(subcommand)]
        action: BacklogCommand,
    },
    /// Prints a 24-hour time as it appears on the board.
    FormatTime { time: String },
    /// Stores or removes the hosted table store API key.
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum BlockCommand {
    List {
        #[arg(long)]
        date: Option<String>,
    },
    Create {
        title: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Persists a new position; fractional values are rounded.
    Move {
        id: RecordId,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Deletes the block's tasks, then the block.
    Delete { id: RecordId },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    List {
        block_id: RecordId,
    },
    Add {
        block_id: RecordId,
        title: String,
        #[arg(long)]
        time: Option<String>,
    },
    Edit {
        task_id: RecordId,
        title: String,
        /// Omit to clear the time.
        #[arg(long)]
        time: Option<String>,
    },
    Toggle {
        task_id: RecordId,
    },
    Delete {
        task_id: RecordId,
    },
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    List,
    Tasks {
        id: RecordId,
    },
    /// Copies a board block and its tasks into the library.
    Save {
        block_id: RecordId,
    },
    /// Places a copy of a template on the board.
    Use {
        id: RecordId,
        #[arg(long)]
        date: Option<String>,
    },
    Delete {
        id: RecordId,
    },
}

#[derive(Subcommand, Debug)]
pub enum BacklogCommand {
    List,
    Add { title: String },
    Delete { id: RecordId },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    SetKey { key: String },
    ClearKey,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    BackendKind::parse(value).map_err(|error| error.to_string())
}

pub fn init_tracing(verbose: u8, quiet: u8) -> Result<(), InfraError> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|error| InfraError::InvalidConfig(format!("invalid RUST_LOG / log filter: {error}")))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(error) = init_result {
        debug!(%error, "tracing subscriber already set, continuing");
    }
    Ok(())
}

pub fn execute(cli: Cli) -> Result<String, String> {
    if let Command::FormatTime { time } = &cli.command {
        return Ok(Value::String(format_time(time)).to_string());
    }

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    let state = AppState::new(workspace, cli.backend).map_err(|error| error.to_string())?;
    debug!(backend = state.backend().as_str(), "workspace ready");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| error.to_string())?;
    let (command, result) = runtime.block_on(dispatch(&state, cli.command));
    let output = result.map_err(|error| state.command_error(command, &error))?;
    serde_json::to_string_pretty(&output).map_err(|error| error.to_string())
}

pub async fn dispatch(state: &AppState, command: Command) -> (&'static str, Result<Value, InfraError>) {
    match command {
        Command::Blocks { action } => match action {
            BlockCommand::List { date } => ("list_blocks", to_json(list_blocks_impl(state, date).await)),
            BlockCommand::Create { title, color, date } => (
                "create_block",
                to_json(create_block_impl(state, title, color, date).await),
            ),
            BlockCommand::Move { id, x, y } => ("move_block", to_json(move_block_impl(state, id, x, y).await)),
            BlockCommand::Delete { id } => (
                "delete_block",
                delete_block_impl(state, id).await.map(|()| json!({ "deleted": id })),
            ),
        },
        Command::Tasks { action } => match action {
            TaskCommand::List { block_id } => ("list_tasks", to_json(list_tasks_impl(state, block_id).await)),
            TaskCommand::Add {
                block_id,
                title,
                time,
            } => (
                "create_task",
                to_json(create_task_impl(state, block_id, title, time).await),
            ),
            TaskCommand::Edit {
                task_id,
                title,
                time,
            } => (
                "update_task",
                to_json(update_task_impl(state, task_id, title, time).await),
            ),
            TaskCommand::Toggle { task_id } => ("toggle_task", to_json(toggle_task_impl(state, task_id).await)),
            TaskCommand::Delete { task_id } => (
                "delete_task",
                delete_task_impl(state, task_id)
                    .await
                    .map(|()| json!({ "deleted": task_id })),
            ),
        },
        Command::Log { date } => ("daily_log", to_json(daily_log_impl(state, date).await)),
        Command::Library { action } => match action {
            LibraryCommand::List => ("list_templates", to_json(list_templates_impl(state).await)),
            LibraryCommand::Tasks { id } => (
                "list_template_tasks",
                to_json(list_template_tasks_impl(state, id).await),
            ),
            LibraryCommand::Save { block_id } => (
                "save_block_as_template",
                to_json(save_block_as_template_impl(state, block_id).await),
            ),
            LibraryCommand::Use { id, date } => (
                "instantiate_template",
                to_json(instantiate_template_impl(state, id, date).await),
            ),
            LibraryCommand::Delete { id } => (
                "delete_template",
                delete_template_impl(state, id).await.map(|()| json!({ "deleted": id })),
            ),
        },
        Command::Backlog { action } => match action {
            BacklogCommand::List => ("list_backlog", to_json(list_backlog_impl(state).await)),
            BacklogCommand::Add { title } => (
                "create_backlog_item",
                to_json(create_backlog_item_impl(state, title).await),
            ),
            BacklogCommand::Delete { id } => (
                "delete_backlog_item",
                delete_backlog_item_impl(state, id)
                    .await
                    .map(|()| json!({ "deleted": id })),
            ),
        },
        Command::FormatTime { time } => ("format_time", Ok(Value::String(format_time(&time)))),
        Command::Auth { action } => match action {
            AuthCommand::SetKey { key } => (
                "set_api_key",
                set_api_key_impl(state, key).map(|()| json!({ "stored": true })),
            ),
            AuthCommand::ClearKey => (
                "clear_api_key",
                clear_api_key_impl(state).map(|()| json!({ "stored": false })),
            ),
        },
    }
}

fn to_json<T: Serialize>(result: Result<T, InfraError>) -> Result<Value, InfraError> {
    Ok(serde_json::to_value(result?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::board::tests::stepping_placement;
    use crate::infrastructure::credential_store::InMemoryApiKeyStore;
    use crate::infrastructure::memory_store::InMemoryTableClient;
    use std::sync::Arc;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse arguments")
    }

    #[test]
    fn global_flags_parse_after_subcommands() {
        let cli = parse(&["dayboard", "blocks", "list", "--backend", "memory", "-vv"]);
        assert_eq!(cli.backend, Some(BackendKind::Memory));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Blocks {
                action: BlockCommand::List { date: None }
            }
        ));
    }

    #[test]
    fn move_accepts_negative_fractional_coordinates() {
        let cli = parse(&["dayboard", "blocks", "move", "3", "-12.5", "40.2"]);
        match cli.command {
            Command::Blocks {
                action: BlockCommand::Move { id, x, y },
            } => {
                assert_eq!(id, 3);
                assert_eq!(x, -12.5);
                assert_eq!(y, 40.2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(Cli::try_parse_from(["dayboard", "--backend", "mongo", "backlog", "list"]).is_err());
    }

    #[test]
    fn format_time_runs_without_a_workspace() {
        let cli = parse(&["dayboard", "format-time", "13:05"]);
        assert_eq!(execute(cli).expect("format"), "\"1:05pm\"");
    }

    #[tokio::test]
    async fn dispatch_returns_json_records() {
        let root = std::env::temp_dir().join(format!("dayboard-cli-tests-{}", std::process::id()));
        let state = AppState::with_client(
            root.clone(),
            BackendKind::Memory,
            Arc::new(InMemoryTableClient::new()),
            Arc::new(InMemoryApiKeyStore::default()),
        )
        .expect("app state")
        .with_placement(stepping_placement());

        let (command, created) = dispatch(
            &state,
            parse(&["dayboard", "blocks", "create", "Gym", "--color", "green"]).command,
        )
        .await;
        assert_eq!(command, "create_block");
        let created = created.expect("created");
        assert_eq!(created["color"], "Green");
        assert_eq!(created["date"], "2026-02-16");

        let (_, blank) = dispatch(&state, parse(&["dayboard", "backlog", "add", "  "]).command).await;
        assert_eq!(blank.expect("blank"), Value::Null);

        let (_, deleted) = dispatch(
            &state,
            parse(&["dayboard", "blocks", "delete", &created["id"].to_string()]).command,
        )
        .await;
        assert_eq!(deleted.expect("deleted"), json!({ "deleted": created["id"] }));

        let _ = std::fs::remove_dir_all(&root);
    }
}
