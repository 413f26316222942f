//! DrawPen Core - Prompt-to-Drawing Compiler
//!
//! # Ground Rules
//! 1. The Caller Always Gets Figures (possibly none)
//! 2. Local Rules Before the Network
//! 3. Remote Output Is Untrusted Until Validated
//! 4. Cache Keys Are Normalized, Cache Values Are Templates
//! 5. Pins Outlive the History Bound

pub mod figures;
pub mod keys;
pub mod heuristics;
pub mod cache;
pub mod remote;
pub mod validation;
pub mod history;
pub mod config;
pub mod paths;
pub mod pipeline;

pub use figures::{Canvas, Figure, FigureKind, FigureTemplate, Point, PALETTE};
pub use keys::normalize;
pub use heuristics::LocalInterpreter;
pub use cache::{DirCache, MemoryCache, ResponseCache};
pub use remote::{GeminiBackend, GenerationBackend, GenerationRequest, RemoteGenerationClient};
pub use validation::{FailureMode, ResponseValidator, ValidatedPayload, ValidationViolation, ViolationSeverity};
pub use history::HistoryStore;
pub use config::Config;
pub use pipeline::{DrawingPipeline, FigureSource, GenerationOutcome, PipelineError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
