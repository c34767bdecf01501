use crate::infrastructure::config::{ensure_default_configs, load_configs};
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceLayout {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<WorkspaceLayout, InfraError> {
    let layout = WorkspaceLayout {
        workspace_root: workspace_root.to_path_buf(),
        config_dir: workspace_root.join("config"),
        state_dir: workspace_root.join("state"),
        logs_dir: workspace_root.join("logs"),
    };

    fs::create_dir_all(&layout.config_dir)?;
    fs::create_dir_all(&layout.state_dir)?;
    fs::create_dir_all(&layout.logs_dir)?;

    ensure_default_configs(&layout.config_dir)?;
    let _ = load_configs(&layout.config_dir)?;

    Ok(layout)
}
