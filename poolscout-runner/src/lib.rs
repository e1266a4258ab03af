//! PoolScout Runner: configuration, prompt building, inference and orchestration.
//!
//! This crate builds on `poolscout-core` to provide:
//! - TOML configuration with documented defaults
//! - Prompt template with a single market-data substitution point
//! - Blocking Ollama client with buffered and streamed responses
//! - The fetch → project → write → reload → prompt → generate pipeline

pub mod config;
pub mod inference;
pub mod pipeline;
pub mod prompt;

pub use config::{ConfigError, ScoutConfig};
pub use inference::{
    ChunkStream, InferenceError, InferenceResponse, InferenceService, OllamaClient, PromptPayload,
};
pub use pipeline::{
    load_template, payload_for, prompt_from_table, refresh_table, run_pipeline, table_for,
    PipelineError, PipelineOutcome, PreparedPrompt, RefreshSummary,
};
pub use prompt::{build_prompt, PromptError, PromptTemplate};
