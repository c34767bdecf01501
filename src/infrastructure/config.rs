use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_JSON: &str = "app.json";
const BOARD_JSON: &str = "board.json";
const DEFAULT_DATABASE_FILE: &str = "dayboard.sqlite";
const DEFAULT_SPAWN_SPREAD: i32 = 100;

const BACKEND_KEYS: &[&str] = &["DAYBOARD_BACKEND"];
const URL_KEYS: &[&str] = &["DAYBOARD_SUPABASE_URL", "SUPABASE_URL"];
const API_KEY_KEYS: &[&str] = &["DAYBOARD_SUPABASE_KEY", "SUPABASE_ANON_KEY"];

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub board: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    Sqlite,
    Memory,
}

impl BackendKind {
    pub fn parse(value: &str) -> Result<Self, InfraError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" | "rest" | "postgrest" => Ok(Self::Supabase),
            "sqlite" | "local" => Ok(Self::Sqlite),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(InfraError::InvalidConfig(format!(
                "unsupported backend: {other} (expected supabase, sqlite or memory)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supabase => "supabase",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub supabase_url: Option<String>,
    pub api_key: Option<String>,
    pub database_path: PathBuf,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Dayboard",
                "backend": "sqlite",
                "supabaseUrl": null,
                "databaseFile": DEFAULT_DATABASE_FILE
            }),
        ),
        (
            BOARD_JSON,
            serde_json::json!({
                "schema": 1,
                "spawnSpread": DEFAULT_SPAWN_SPREAD
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        board: read_config(&config_dir.join(BOARD_JSON))?,
    })
}

fn config_str<'a>(config: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn resolve_backend_settings<F>(
    config_dir: &Path,
    state_dir: &Path,
    lookup: F,
) -> Result<BackendSettings, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;

    let kind = match optional_lookup_value(&lookup, BACKEND_KEYS) {
        Some(value) => BackendKind::parse(&value)?,
        None => config_str(&app, "backend")
            .map(BackendKind::parse)
            .transpose()?
            .unwrap_or(BackendKind::Sqlite),
    };
    let supabase_url = optional_lookup_value(&lookup, URL_KEYS)
        .or_else(|| config_str(&app, "supabaseUrl").map(ToOwned::to_owned));
    let api_key = optional_lookup_value(&lookup, API_KEY_KEYS);
    let database_file = config_str(&app, "databaseFile").unwrap_or(DEFAULT_DATABASE_FILE);

    Ok(BackendSettings {
        kind,
        supabase_url,
        api_key,
        database_path: state_dir.join(database_file),
    })
}

pub fn read_spawn_spread(config_dir: &Path) -> Result<i32, InfraError> {
    let board = read_config(&config_dir.join(BOARD_JSON))?;
    let spread = board
        .get("spawnSpread")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(i64::from(DEFAULT_SPAWN_SPREAD));
    if spread < 2 || spread > i64::from(i32::MAX) {
        return Err(InfraError::InvalidConfig(format!(
            "spawnSpread must be between 2 and {}, got {spread}",
            i32::MAX
        )));
    }
    Ok(spread as i32)
}

pub fn missing_setting_error(field_name: &str, keys: &[&str]) -> InfraError {
    InfraError::InvalidConfig(format!(
        "missing {} (set one of: {})",
        field_name,
        keys.join(", ")
    ))
}

pub fn url_keys() -> &'static [&'static str] {
    URL_KEYS
}

pub fn api_key_keys() -> &'static [&'static str] {
    API_KEY_KEYS
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
