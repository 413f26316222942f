//! Path utilities for persisted engine state

use std::path::{Path, PathBuf};

use crate::pipeline::PipelineError;

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf, PipelineError> {
    dirs::data_dir()
        .map(|p| p.join("drawpen"))
        .ok_or_else(|| PipelineError::Storage("Could not find app data directory".to_string()))
}

/// Gets the configuration file path
pub fn get_config_path() -> Result<PathBuf, PipelineError> {
    get_app_data_dir().map(|p| p.join("config.json"))
}

/// Gets the response cache directory under `data_dir`
pub fn cache_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("ai-cache")
}

/// Gets the prompt history file under `data_dir`
pub fn history_path(data_dir: &Path) -> PathBuf {
    data_dir.join("history.json")
}
