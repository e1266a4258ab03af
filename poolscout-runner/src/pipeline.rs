//! Pipeline orchestration: wires provider, projector, table, prompt and inference.
//!
//! Three entry points:
//! - `run_pipeline()`: fetch → project → write → reload → prompt → generate. Used by `run`.
//! - `refresh_table()`: fetch → project → write, no inference. Used by `fetch`.
//! - `prompt_from_table()`: reload an existing table → prompt, no network. Used by `prompt`.
//!
//! A fetch or projection failure stops the run before the table is touched,
//! so the previous table (if any) stays byte-for-byte intact.

use log::{error, info};
use poolscout_core::data::{
    project_all, FetchError, PoolProvider, PoolTable, ProjectionError, ReadError, TableMeta,
    TrendingQuery, WriteError,
};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{ConfigError, ScoutConfig};
use crate::inference::{InferenceError, InferenceResponse, InferenceService, PromptPayload};
use crate::prompt::{build_prompt, PromptError, PromptTemplate};

/// Errors from the pipeline, one variant per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
    #[error("table write failed: {0}")]
    Write(#[from] WriteError),
    #[error("table read failed: {0}")]
    Read(#[from] ReadError),
    #[error("prompt build failed: {0}")]
    Prompt(#[from] PromptError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

/// What a table refresh produced.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub query: TrendingQuery,
    pub table_path: PathBuf,
    pub rows_written: usize,
    /// Records dropped under the `skip` policy.
    pub skipped: Vec<ProjectionError>,
    pub meta: TableMeta,
}

/// A prompt rendered from the table on disk.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub rows: usize,
    pub prompt: String,
}

/// Complete result of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub refresh: RefreshSummary,
    pub prompt: PreparedPrompt,
    pub response: InferenceResponse,
}

/// The table configured by `[output]`.
pub fn table_for(config: &ScoutConfig) -> PoolTable {
    PoolTable::new(&config.output.table_path)
}

/// The template configured by `[prompt]`, or the built-in one.
pub fn load_template(config: &ScoutConfig) -> Result<PromptTemplate, PromptError> {
    match &config.prompt.template_path {
        Some(path) => PromptTemplate::from_file(path),
        None => Ok(PromptTemplate::default()),
    }
}

/// Build the request body for a rendered prompt.
pub fn payload_for(config: &ScoutConfig, prompt: String) -> PromptPayload {
    PromptPayload {
        model: config.inference.model.clone(),
        prompt,
        stream: config.inference.stream,
        options: config.generation.to_options(),
    }
}

/// Fetch trending pools, project them and replace the table.
pub fn refresh_table(
    config: &ScoutConfig,
    provider: &dyn PoolProvider,
) -> Result<RefreshSummary, PipelineError> {
    let query = config.query()?;
    let table = table_for(config);

    info!(
        "Fetching {} trending pools for {}/{} from {}",
        query.interval,
        query.network,
        query.dex,
        provider.name()
    );
    let raws = provider.fetch_trending_pools(&query).map_err(|e| {
        error!("Fetch failed, leaving {} untouched: {e}", table.path().display());
        e
    })?;

    let batch = project_all(raws, config.pipeline.on_invalid_record).map_err(|e| {
        error!("Projection failed, leaving {} untouched: {e}", table.path().display());
        e
    })?;

    table.write(&batch.records)?;
    let meta = table.write_meta(&query, batch.records.len())?;

    Ok(RefreshSummary {
        query,
        table_path: table.path().to_path_buf(),
        rows_written: batch.records.len(),
        skipped: batch.skipped,
        meta,
    })
}

/// Reload the table and render the prompt from it.
pub fn prompt_from_table(
    table: &PoolTable,
    template: &PromptTemplate,
) -> Result<PreparedPrompt, PipelineError> {
    let rows = table.read()?;
    let prompt = build_prompt(template, &rows)?;
    info!("Built prompt from {} row(s) ({} bytes)", rows.len(), prompt.len());
    Ok(PreparedPrompt {
        rows: rows.len(),
        prompt,
    })
}

/// Run every stage in order.
///
/// The table is always read back from disk before the prompt is built, so
/// the model sees exactly what was persisted.
pub fn run_pipeline(
    config: &ScoutConfig,
    provider: &dyn PoolProvider,
    inference: &dyn InferenceService,
) -> Result<PipelineOutcome, PipelineError> {
    config.validate()?;
    let template = load_template(config)?;

    let refresh = refresh_table(config, provider)?;
    let prompt = prompt_from_table(&table_for(config), &template)?;

    let payload = payload_for(config, prompt.prompt.clone());
    let response = inference.generate(&payload).map_err(|e| {
        error!("Inference request failed: {e}");
        e
    })?;

    Ok(PipelineOutcome {
        refresh,
        prompt,
        response,
    })
}
