//! Prompt History - Bounded Recent Log + Pinned Set
//!
//! Pins are never evicted. A pinned prompt stays in the log but is hidden
//! from the recent view and listed ahead of it in suggestions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    history: Vec<String>,
    #[serde(default)]
    pinned: Vec<String>,
}

#[derive(Debug)]
pub struct HistoryStore {
    /// Most recent first.
    log: Vec<String>,
    /// Pin order.
    pinned: Vec<String>,
    limit: usize,
    path: Option<PathBuf>,
}

impl HistoryStore {
    pub fn in_memory(limit: usize) -> Self {
        Self {
            log: vec![],
            pinned: vec![],
            limit,
            path: None,
        }
    }

    /// Loads `path` if present; every later mutation is written back to it.
    pub fn open(path: &Path, limit: usize) -> Result<Self, PipelineError> {
        let file = if path.exists() {
            match serde_json::from_str::<HistoryFile>(&fs::read_to_string(path)?) {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("[history] unreadable {}, starting empty: {}", path.display(), e);
                    HistoryFile::default()
                }
            }
        } else {
            HistoryFile::default()
        };

        let mut store = Self {
            log: file.history,
            pinned: vec![],
            limit,
            path: Some(path.to_path_buf()),
        };
        for prompt in file.pinned {
            if !store.pinned.contains(&prompt) {
                store.pinned.push(prompt);
            }
        }
        store.log.truncate(limit);
        Ok(store)
    }

    /// Move-to-front insert of the raw prompt.
    pub fn record(&mut self, prompt: &str) -> Result<(), PipelineError> {
        self.log.retain(|p| p != prompt);
        self.log.insert(0, prompt.to_string());
        self.log.truncate(self.limit);
        self.persist()
    }

    /// Adds or removes a pin, returning the pinned list afterwards.
    pub fn toggle_pin(&mut self, prompt: &str) -> Result<Vec<String>, PipelineError> {
        if let Some(pos) = self.pinned.iter().position(|p| p == prompt) {
            self.pinned.remove(pos);
        } else {
            self.pinned.push(prompt.to_string());
        }
        self.persist()?;
        Ok(self.pinned.clone())
    }

    pub fn is_pinned(&self, prompt: &str) -> bool {
        self.pinned.iter().any(|p| p == prompt)
    }

    /// Recent prompts, excluding pinned ones.
    pub fn recent(&self) -> Vec<String> {
        self.log.iter().filter(|p| !self.is_pinned(p)).cloned().collect()
    }

    pub fn pinned(&self) -> Vec<String> {
        self.pinned.clone()
    }

    /// Pinned matches first, then unpinned recent matches. Case-insensitive.
    pub fn query(&self, filter: &str) -> Vec<String> {
        let needle = filter.trim().to_lowercase();
        let matches = |p: &String| needle.is_empty() || p.to_lowercase().contains(&needle);

        self.pinned
            .iter()
            .filter(|p| matches(*p))
            .chain(self.log.iter().filter(|p| !self.is_pinned(p) && matches(*p)))
            .cloned()
            .collect()
    }

    fn persist(&self) -> Result<(), PipelineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = HistoryFile {
            history: self.log.clone(),
            pinned: self.pinned.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
