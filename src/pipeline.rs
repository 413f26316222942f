//! Drawing Pipeline - Single Entry Point
//!
//! CRITICAL: generate never fails. Every remote-path error is caught here and
//! surfaced only through `GenerationOutcome::error`.

use std::path::Path;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{DirCache, ResponseCache};
use crate::config::Config;
use crate::figures::{Canvas, Figure, FigureTemplate};
use crate::heuristics::LocalInterpreter;
use crate::history::HistoryStore;
use crate::keys::normalize;
use crate::paths::{cache_dir, history_path};
use crate::remote::{GeminiBackend, GenerationBackend, RemoteGenerationClient};
use crate::validation::ResponseValidator;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("No API key configured (set apiKey or {0})")]
    NoCredential(String),

    #[error("Unexpected response structure: {0}")]
    ResponseShape(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload rejected: {0}")]
    RejectedPayload(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Which producer a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureSource {
    Local,
    Cache,
    Remote,
}

/// Figures plus the diagnostic the public contract hides.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub figures: Vec<Figure>,
    pub source: Option<FigureSource>,
    pub error: Option<PipelineError>,
}

impl GenerationOutcome {
    fn produced(figures: Vec<Figure>, source: FigureSource) -> Self {
        Self { figures, source: Some(source), error: None }
    }

    fn failed(error: PipelineError) -> Self {
        Self { figures: vec![], source: None, error: Some(error) }
    }
}

/// Hands out ids that are unique within a batch and increase across batches.
#[derive(Debug, Default)]
struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Reserves `count` consecutive ids starting at or after the current time
    /// in milliseconds.
    fn reserve(&mut self, count: usize) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let start = now.max(self.next);
        self.next = start + count as u64;
        start
    }
}

/// The drawing pipeline - owns cache, history and the remote client
pub struct DrawingPipeline {
    interpreter: LocalInterpreter,
    cache: Box<dyn ResponseCache>,
    history: HistoryStore,
    remote: RemoteGenerationClient,
    validator: ResponseValidator,
    config: Config,
    ids: IdAllocator,
}

impl DrawingPipeline {
    pub fn new(
        config: Config,
        cache: Box<dyn ResponseCache>,
        history: HistoryStore,
        backend: Box<dyn GenerationBackend>,
    ) -> Self {
        Self {
            interpreter: LocalInterpreter::new(),
            cache,
            history,
            remote: RemoteGenerationClient::new(backend, &config.model),
            validator: ResponseValidator::new(config.failure_mode.clone()),
            config,
            ids: IdAllocator::default(),
        }
    }

    /// Disk-backed cache and history under `data_dir`, Gemini transport.
    pub fn open(config: Config, data_dir: &Path) -> Result<Self, PipelineError> {
        let cache = DirCache::open(&cache_dir(data_dir))?;
        let history = HistoryStore::open(&history_path(data_dir), config.history_limit)?;
        let backend = GeminiBackend::from_config(&config)?;
        log::info!("[pipeline] state directory {}", data_dir.display());
        Ok(Self::new(config, Box::new(cache), history, Box::new(backend)))
    }

    /// Public contract: always a figure list, possibly empty.
    pub async fn generate(&mut self, prompt: &str, canvas: Canvas) -> Vec<Figure> {
        self.generate_detailed(prompt, canvas).await.figures
    }

    pub async fn generate_detailed(&mut self, prompt: &str, canvas: Canvas) -> GenerationOutcome {
        if prompt.trim().is_empty() {
            return GenerationOutcome::failed(PipelineError::EmptyPrompt);
        }

        if let Some(templates) = self.interpreter.interpret(prompt, &canvas) {
            log::info!("[generate] local rules produced {} figure(s)", templates.len());
            self.record(prompt);
            return GenerationOutcome::produced(self.materialize(templates), FigureSource::Local);
        }

        let key = normalize(prompt);
        match self.cache.get(&key) {
            Ok(Some(templates)) => {
                log::info!("[generate] cache hit for '{}'", key);
                self.record(prompt);
                return GenerationOutcome::produced(self.materialize(templates), FigureSource::Cache);
            }
            Ok(None) => log::info!("[generate] cache miss for '{}'", key),
            Err(e) => log::warn!("[generate] cache read failed for '{}', treating as miss: {}", key, e),
        }

        match self.generate_remote(prompt, &key, &canvas).await {
            Ok(templates) => {
                self.record(prompt);
                GenerationOutcome::produced(self.materialize(templates), FigureSource::Remote)
            }
            Err(e) => {
                log::error!("[generate] remote generation failed: {}", e);
                GenerationOutcome::failed(e)
            }
        }
    }

    async fn generate_remote(
        &mut self,
        prompt: &str,
        key: &str,
        canvas: &Canvas,
    ) -> Result<Vec<FigureTemplate>, PipelineError> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| PipelineError::NoCredential(self.config.api_key_env.clone()))?;

        let text = self.remote.generate(&api_key, prompt, canvas).await?;
        log::debug!("[generate] remote payload: {}", text);

        let payload = self.validator.validate(&text, canvas)?;

        if payload.has_errors() {
            if payload.templates.is_empty() {
                return Err(PipelineError::RejectedPayload(payload.error_summary()));
            }
            // Degraded batch: draw what survived, ask again next time.
            log::warn!("[generate] partial payload for '{}' not cached", key);
            return Ok(payload.templates);
        }

        if let Err(e) = self.cache.set(key, &payload.templates) {
            log::warn!("[generate] failed to cache '{}': {}", key, e);
        }

        Ok(payload.templates)
    }

    /// Fresh ids and jitter; everything else copied from the templates.
    fn materialize(&mut self, templates: Vec<FigureTemplate>) -> Vec<Figure> {
        let start = self.ids.reserve(templates.len());
        let mut rng = rand::thread_rng();

        templates
            .into_iter()
            .enumerate()
            .map(|(i, template)| Figure {
                id: start + i as u64,
                template,
                rainbow_color_deg: Some(rng.gen_range(0.0..360.0)),
            })
            .collect()
    }

    fn record(&mut self, prompt: &str) {
        if let Err(e) = self.history.record(prompt) {
            log::warn!("[history] failed to persist history: {}", e);
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.recent()
    }

    pub fn pinned_prompts(&self) -> Vec<String> {
        self.history.pinned()
    }

    pub fn toggle_pin(&mut self, prompt: &str) -> Result<Vec<String>, PipelineError> {
        self.history.toggle_pin(prompt)
    }

    pub fn suggestions(&self, filter: &str) -> Vec<String> {
        self.history.query(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_unique_across_batches() {
        let mut ids = IdAllocator::default();
        let a = ids.reserve(3);
        let b = ids.reserve(2);
        assert!(b >= a + 3);
        let c = ids.reserve(0);
        assert!(c >= b + 2);
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::NoCredential("GEMINI_API_KEY".to_string());
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = PipelineError::Api { status: 429, message: "slow down".to_string() };
        assert_eq!(err.to_string(), "API error (429): slow down");
    }
}
