use crate::application::backlog::BacklogService;
use crate::application::board::{BoardService, DailyLogEntry, Placement};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::library::{CopyOutcome, LibraryService};
use crate::domain::models::{
    BacklogItem, Block, BlockColor, LibraryBlock, LibraryTask, Position, RecordId, Task,
};
use crate::domain::time_format::format_picker_time;
use crate::infrastructure::config::{
    BackendKind, BackendSettings, api_key_keys, missing_setting_error, read_spawn_spread,
    resolve_backend_settings, url_keys,
};
use crate::infrastructure::credential_store::{ApiKeyStore, KeyringApiKeyStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::memory_store::InMemoryTableClient;
use crate::infrastructure::rest_client::RestTableClient;
use crate::infrastructure::sqlite_store::SqliteTableClient;
use crate::infrastructure::table_client::TableClient;
use chrono::{NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    backend: BackendKind,
    // None when the client was injected already connected.
    settings: Option<BackendSettings>,
    client: Mutex<Option<Arc<dyn TableClient>>>,
    key_store: Arc<dyn ApiKeyStore>,
    placement: Placement,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf, backend: Option<BackendKind>) -> Result<Self, InfraError> {
        let layout = bootstrap_workspace(&workspace_root)?;
        let mut settings = resolve_backend_settings(&layout.config_dir, &layout.state_dir, |key| {
            std::env::var(key).ok()
        })?;
        if let Some(kind) = backend {
            settings.kind = kind;
        }
        let spread = read_spawn_spread(&layout.config_dir)?;

        Ok(Self {
            config_dir: layout.config_dir,
            logs_dir: layout.logs_dir,
            backend: settings.kind,
            settings: Some(settings),
            client: Mutex::new(None),
            key_store: Arc::new(KeyringApiKeyStore::default()),
            placement: Placement::random(spread),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_client(
        workspace_root: PathBuf,
        backend: BackendKind,
        client: Arc<dyn TableClient>,
        key_store: Arc<dyn ApiKeyStore>,
    ) -> Result<Self, InfraError> {
        let layout = bootstrap_workspace(&workspace_root)?;
        let spread = read_spawn_spread(&layout.config_dir)?;
        Ok(Self {
            backend,
            settings: None,
            config_dir: layout.config_dir,
            logs_dir: layout.logs_dir,
            client: Mutex::new(Some(client)),
            key_store,
            placement: Placement::random(spread),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn client(&self) -> Result<Arc<dyn TableClient>, InfraError> {
        let mut guard = self
            .client
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("client lock poisoned: {error}")))?;
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client = self.connect()?;
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    fn connect(&self) -> Result<Arc<dyn TableClient>, InfraError> {
        let settings = self.settings.as_ref().ok_or_else(|| {
            InfraError::InvalidConfig("no backend settings to reconnect with".to_string())
        })?;
        match settings.kind {
            BackendKind::Supabase => {
                let url = settings
                    .supabase_url
                    .clone()
                    .ok_or_else(|| missing_setting_error("supabase url", url_keys()))?;
                let api_key = match settings.api_key.clone() {
                    Some(api_key) => api_key,
                    None => self.key_store.load_key()?.ok_or_else(|| {
                        missing_setting_error("supabase api key (or run `auth set-key`)", api_key_keys())
                    })?,
                };
                tracing::debug!(url = %url, "connecting to hosted table store");
                Ok(Arc::new(RestTableClient::new(&url, &api_key)?))
            }
            BackendKind::Sqlite => {
                tracing::debug!(path = %settings.database_path.display(), "opening local table store");
                Ok(Arc::new(SqliteTableClient::open(&settings.database_path)?))
            }
            BackendKind::Memory => Ok(Arc::new(InMemoryTableClient::new())),
        }
    }

    fn board(&self) -> Result<BoardService<dyn TableClient>, InfraError> {
        Ok(BoardService::new(self.client()?).with_placement(self.placement.clone()))
    }

    fn library(&self) -> Result<LibraryService<dyn TableClient>, InfraError> {
        Ok(LibraryService::new(self.client()?).with_placement(self.placement.clone()))
    }

    fn backlog(&self) -> Result<BacklogService<dyn TableClient>, InfraError> {
        Ok(BacklogService::new(self.client()?))
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::debug!(command, "{message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

pub async fn list_blocks_impl(state: &AppState, date: Option<String>) -> Result<Vec<Block>, InfraError> {
    let date = resolve_date(state, date.as_deref())?;
    state.board()?.list_blocks(date).await
}

pub async fn create_block_impl(
    state: &AppState,
    title: String,
    color: Option<String>,
    date: Option<String>,
) -> Result<Option<Block>, InfraError> {
    let color = parse_color(color.as_deref());
    let date = parse_optional_date(date.as_deref())?;
    let created = state.board()?.create_block(&title, color, date).await?;
    match &created {
        Some(block) => state.log_info(
            "create_block",
            &format!("created block_id={} date={}", block.id, block.date),
        ),
        None => state.log_info("create_block", "skipped: blank title"),
    }
    Ok(created)
}

pub async fn move_block_impl(
    state: &AppState,
    block_id: RecordId,
    x: f64,
    y: f64,
) -> Result<Position, InfraError> {
    let position = state.board()?.update_block_position(block_id, x, y).await?;
    state.log_info(
        "move_block",
        &format!("moved block_id={block_id} x={} y={}", position.x, position.y),
    );
    Ok(position)
}

pub async fn delete_block_impl(state: &AppState, block_id: RecordId) -> Result<(), InfraError> {
    state.board()?.delete_block(block_id).await?;
    state.log_info("delete_block", &format!("deleted block_id={block_id}"));
    Ok(())
}

pub async fn list_tasks_impl(state: &AppState, block_id: RecordId) -> Result<Vec<Task>, InfraError> {
    state.board()?.list_tasks(block_id).await
}

pub async fn create_task_impl(
    state: &AppState,
    block_id: RecordId,
    title: String,
    time: Option<String>,
) -> Result<Option<Task>, InfraError> {
    let time = picker_time(time.as_deref());
    let created = state
        .board()?
        .create_task(block_id, &title, time.as_deref())
        .await?;
    match &created {
        Some(task) => state.log_info(
            "create_task",
            &format!("created task_id={} block_id={block_id}", task.id),
        ),
        None => state.log_info("create_task", "skipped: blank title"),
    }
    Ok(created)
}

pub async fn update_task_impl(
    state: &AppState,
    task_id: RecordId,
    title: String,
    time: Option<String>,
) -> Result<Option<Task>, InfraError> {
    let time = picker_time(time.as_deref());
    let updated = state
        .board()?
        .update_task(task_id, &title, time.as_deref())
        .await?;
    match &updated {
        Some(_) => state.log_info("update_task", &format!("updated task_id={task_id}")),
        None => state.log_info("update_task", "skipped: blank title"),
    }
    Ok(updated)
}

pub async fn toggle_task_impl(state: &AppState, task_id: RecordId) -> Result<Task, InfraError> {
    let task = state.board()?.toggle_task(task_id).await?;
    state.log_info(
        "toggle_task",
        &format!("task_id={task_id} completed={}", task.completed),
    );
    Ok(task)
}

pub async fn delete_task_impl(state: &AppState, task_id: RecordId) -> Result<(), InfraError> {
    state.board()?.delete_task(task_id).await?;
    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    Ok(())
}

pub async fn daily_log_impl(
    state: &AppState,
    date: Option<String>,
) -> Result<Vec<DailyLogEntry>, InfraError> {
    let date = resolve_date(state, date.as_deref())?;
    state.board()?.daily_log(date).await
}

pub async fn list_templates_impl(state: &AppState) -> Result<Vec<LibraryBlock>, InfraError> {
    state.library()?.list_templates().await
}

pub async fn list_template_tasks_impl(
    state: &AppState,
    library_block_id: RecordId,
) -> Result<Vec<LibraryTask>, InfraError> {
    state.library()?.list_template_tasks(library_block_id).await
}

pub async fn save_block_as_template_impl(
    state: &AppState,
    block_id: RecordId,
) -> Result<CopyOutcome<LibraryBlock>, InfraError> {
    let outcome = state.library()?.save_block_as_template(block_id).await?;
    log_copy_outcome(
        state,
        "save_block_as_template",
        &format!(
            "block_id={block_id} library_block_id={} tasks={}",
            outcome.record.id, outcome.copied_tasks
        ),
        outcome.incomplete.as_deref(),
    );
    Ok(outcome)
}

pub async fn instantiate_template_impl(
    state: &AppState,
    library_block_id: RecordId,
    date: Option<String>,
) -> Result<CopyOutcome<Block>, InfraError> {
    let date = parse_optional_date(date.as_deref())?;
    let outcome = state
        .library()?
        .instantiate_template(library_block_id, date)
        .await?;
    log_copy_outcome(
        state,
        "instantiate_template",
        &format!(
            "library_block_id={library_block_id} block_id={} tasks={}",
            outcome.record.id, outcome.copied_tasks
        ),
        outcome.incomplete.as_deref(),
    );
    Ok(outcome)
}

pub async fn delete_template_impl(state: &AppState, library_block_id: RecordId) -> Result<(), InfraError> {
    state.library()?.delete_template(library_block_id).await?;
    state.log_info(
        "delete_template",
        &format!("deleted library_block_id={library_block_id}"),
    );
    Ok(())
}

pub async fn list_backlog_impl(state: &AppState) -> Result<Vec<BacklogItem>, InfraError> {
    state.backlog()?.list().await
}

pub async fn create_backlog_item_impl(
    state: &AppState,
    title: String,
) -> Result<Option<BacklogItem>, InfraError> {
    let created = state.backlog()?.create(&title).await?;
    match &created {
        Some(item) => state.log_info("create_backlog_item", &format!("created backlog_id={}", item.id)),
        None => state.log_info("create_backlog_item", "skipped: blank title"),
    }
    Ok(created)
}

pub async fn delete_backlog_item_impl(state: &AppState, item_id: RecordId) -> Result<(), InfraError> {
    state.backlog()?.delete(item_id).await?;
    state.log_info("delete_backlog_item", &format!("deleted backlog_id={item_id}"));
    Ok(())
}

pub fn set_api_key_impl(state: &AppState, api_key: String) -> Result<(), InfraError> {
    state.key_store.save_key(&api_key)?;
    state.log_info("set_api_key", "stored table store api key");
    Ok(())
}

pub fn clear_api_key_impl(state: &AppState) -> Result<(), InfraError> {
    state.key_store.delete_key()?;
    state.log_info("clear_api_key", "removed table store api key");
    Ok(())
}

fn log_copy_outcome(state: &AppState, command: &str, summary: &str, incomplete: Option<&str>) {
    match incomplete {
        Some(reason) => state.log_error(command, &format!("incomplete {summary}: {reason}")),
        None => state.log_info(command, summary),
    }
}

fn parse_color(value: Option<&str>) -> BlockColor {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => BlockColor::default(),
        Some(raw) => BlockColor::parse(raw).unwrap_or_else(|| {
            tracing::warn!(color = raw, "unrecognised block color stored as Unknown");
            BlockColor::Unknown
        }),
    }
}

fn picker_time(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let lowered = value.to_ascii_lowercase();
    if lowered.contains("am") || lowered.contains("pm") {
        return Some(value.to_string());
    }
    Some(format_picker_time(value).unwrap_or_else(|| value.to_string()))
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, InfraError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
                InfraError::InvalidInput(format!("date must be YYYY-MM-DD, got {value}: {error}"))
            })
        })
        .transpose()
}

fn resolve_date(state: &AppState, value: Option<&str>) -> Result<NaiveDate, InfraError> {
    Ok(state.placement.date_or_today(parse_optional_date(value)?))
}
