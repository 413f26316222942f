//! Engine configuration, stored as JSON in the data directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;
use crate::validation::FailureMode;

pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Overrides the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_api_key_env() -> String { DEFAULT_API_KEY_ENV.to_string() }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_endpoint() -> String { DEFAULT_ENDPOINT.to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_history_limit() -> usize { DEFAULT_HISTORY_LIMIT }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_timeout_secs(),
            history_limit: default_history_limit(),
            failure_mode: FailureMode::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Reads `path` if it exists, otherwise returns defaults.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Configured key first, then the environment. Blank values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn data_dir(&self) -> Result<PathBuf, PipelineError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::paths::get_app_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.failure_mode, FailureMode::Drop);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"apiKey": "abc", "historyLimit": 5, "failureMode": "reject"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.failure_mode, FailureMode::Reject);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = Config { model: "m".to_string(), ..Config::default() };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap().model, "m");
    }

    #[test]
    fn test_configured_key_wins() {
        let config = Config {
            api_key: Some("from-config".to_string()),
            api_key_env: "DRAWPEN_TEST_KEY_UNUSED".to_string(),
            ..Config::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("DRAWPEN_TEST_KEY_FALLBACK", "from-env");
        let config = Config {
            api_key: Some("   ".to_string()),
            api_key_env: "DRAWPEN_TEST_KEY_FALLBACK".to_string(),
            ..Config::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-env"));
    }

    #[test]
    fn test_no_key_anywhere() {
        let config = Config {
            api_key_env: "DRAWPEN_TEST_KEY_NEVER_SET".to_string(),
            ..Config::default()
        };
        assert!(config.resolve_api_key().is_none());
    }
}
