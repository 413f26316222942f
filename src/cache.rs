//! Response Cache - Normalized Prompt to Figure Templates
//!
//! Entries never expire. Only remote results are stored here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::figures::FigureTemplate;
use crate::keys::entry_file_name;
use crate::pipeline::PipelineError;
use crate::ENGINE_VERSION;

/// Key/value store for remote results. Keys are already normalized.
pub trait ResponseCache: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<FigureTemplate>>, PipelineError>;
    fn set(&mut self, key: &str, templates: &[FigureTemplate]) -> Result<(), PipelineError>;
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<FigureTemplate>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<FigureTemplate>>, PipelineError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, templates: &[FigureTemplate]) -> Result<(), PipelineError> {
        self.entries.insert(key.to_string(), templates.to_vec());
        Ok(())
    }
}

/// On-disk record for one cached prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub prompt: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub figures: Vec<FigureTemplate>,
}

/// One JSON file per entry, named by the key's digest.
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    pub fn open(dir: &Path) -> Result<Self, PipelineError> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(entry_file_name(key))
    }
}

impl ResponseCache for DirCache {
    fn get(&self, key: &str) -> Result<Option<Vec<FigureTemplate>>, PipelineError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let entry: CacheEntry = serde_json::from_str(&content)?;

        // Digest collision or a hand-edited file.
        if entry.prompt != key {
            log::warn!("[cache] entry {} belongs to another prompt, ignoring", path.display());
            return Ok(None);
        }

        Ok(Some(entry.figures))
    }

    fn set(&mut self, key: &str, templates: &[FigureTemplate]) -> Result<(), PipelineError> {
        let entry = CacheEntry {
            prompt: key.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            figures: templates.to_vec(),
        };
        let content = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(key), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figures::FigureKind;

    fn templates() -> Vec<FigureTemplate> {
        vec![
            FigureTemplate::shape(FigureKind::Line, vec![[0.0, 0.0], [5.0, 5.0]], 2, 2),
            FigureTemplate::shape(FigureKind::Oval, vec![[1.0, 1.0], [9.0, 9.0]], 3, 1),
        ]
    }

    #[test]
    fn test_memory_cache_hit_and_miss() {
        let mut cache = MemoryCache::new();
        assert!(cache.get("a house").unwrap().is_none());

        cache.set("a house", &templates()).unwrap();
        assert_eq!(cache.get("a house").unwrap(), Some(templates()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = MemoryCache::new();
        cache.set("k", &templates()).unwrap();
        cache.set("k", &templates()[..1]).unwrap();
        assert_eq!(cache.get("k").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_dir_cache_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut cache = DirCache::open(tmp.path()).unwrap();
            cache.set("a house", &templates()).unwrap();
        }
        let cache = DirCache::open(tmp.path()).unwrap();
        assert_eq!(cache.get("a house").unwrap(), Some(templates()));
        assert!(cache.get("a boat").unwrap().is_none());
    }

    #[test]
    fn test_dir_cache_entry_format() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = DirCache::open(tmp.path()).unwrap();
        cache.set("a house", &templates()).unwrap();

        let raw = fs::read_to_string(tmp.path().join(entry_file_name("a house"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["prompt"], "a house");
        assert_eq!(value["engineVersion"], ENGINE_VERSION);
        assert!(value["createdAt"].is_string());
        assert_eq!(value["figures"][0]["type"], "line");
        assert!(value["figures"][0].get("id").is_none());
    }

    #[test]
    fn test_dir_cache_corrupt_entry_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DirCache::open(tmp.path()).unwrap();
        fs::write(tmp.path().join(entry_file_name("broken")), "{not json").unwrap();
        assert!(cache.get("broken").is_err());
    }
}
