//! PoolScout CLI: fetch trending pools, persist them, and ask a local model about them.
//!
//! Commands:
//! - `run` fetches, writes the table, reads it back and sends the prompt to Ollama
//! - `fetch` only refreshes the table
//! - `prompt` renders the prompt from the existing table (offline)
//! - `table` reports the sidecar metadata and whether the table still matches it
//!
//! Exit codes: 0 success, 1 configuration or usage, 2 fetch, 3 projection or
//! table, 4 inference.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, LevelFilter};
use poolscout_core::data::{BatchPolicy, GeckoTerminalProvider, TrendingInterval};
use poolscout_runner::{
    load_template, prompt_from_table, refresh_table, run_pipeline, table_for, InferenceError,
    InferenceResponse, OllamaClient, PipelineError, ScoutConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;

const EXIT_USAGE: i32 = 1;
const EXIT_FETCH: i32 = 2;
const EXIT_TABLE: i32 = 3;
const EXIT_INFERENCE: i32 = 4;

#[derive(Parser)]
#[command(
    name = "poolscout",
    version,
    about = "PoolScout: GeckoTerminal trending pools analysed by a local Ollama model"
)]
struct Cli {
    /// Path to a TOML config file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (request URLs and full payloads).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, store, reload, prompt and run inference.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        inference: InferenceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch trending pools and replace the table. No inference.
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the prompt built from the existing table. No network access.
    Prompt {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show the table's sidecar metadata.
    Table {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Network id, e.g. solana.
    #[arg(long)]
    network: Option<String>,

    /// DEX id, e.g. pump-fun.
    #[arg(long)]
    dex: Option<String>,

    /// Trending window: 5m, 1h, 6h or 24h.
    #[arg(long)]
    interval: Option<TrendingInterval>,

    /// GeckoTerminal API base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Drop invalid records instead of aborting the batch.
    #[arg(long, default_value_t = false)]
    skip_invalid: bool,
}

#[derive(Args)]
struct InferenceArgs {
    /// Ollama model name.
    #[arg(long)]
    model: Option<String>,

    /// Ollama host, e.g. http://localhost:11434.
    #[arg(long)]
    host: Option<String>,

    /// Print the analysis incrementally as it is generated.
    #[arg(long, default_value_t = false)]
    stream: bool,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    top_p: Option<f64>,
}

#[derive(Args)]
struct OutputArgs {
    /// Table path. Defaults to data/trending_pools.csv.
    #[arg(long)]
    table: Option<PathBuf>,
}

impl SourceArgs {
    fn apply(self, config: &mut ScoutConfig) {
        if let Some(network) = self.network {
            config.source.network = network;
        }
        if let Some(dex) = self.dex {
            config.source.dex = dex;
        }
        if let Some(interval) = self.interval {
            config.source.interval = interval;
        }
        if let Some(base_url) = self.base_url {
            config.source.base_url = base_url;
        }
        if self.skip_invalid {
            config.pipeline.on_invalid_record = BatchPolicy::Skip;
        }
    }
}

impl InferenceArgs {
    fn apply(self, config: &mut ScoutConfig) {
        if let Some(model) = self.model {
            config.inference.model = model;
        }
        if let Some(host) = self.host {
            config.inference.host = host;
        }
        if self.stream {
            config.inference.stream = true;
        }
        if let Some(t) = self.temperature {
            config.generation.temperature = t;
        }
        if let Some(p) = self.top_p {
            config.generation.top_p = p;
        }
    }
}

impl OutputArgs {
    fn apply(self, config: &mut ScoutConfig) {
        if let Some(table) = self.table {
            config.output.table_path = table;
        }
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(parse_exit_code(&e));
        }
    };
    init_logger(cli.verbose);

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            source,
            inference,
            output,
        } => {
            source.apply(&mut config);
            inference.apply(&mut config);
            output.apply(&mut config);
            run_cmd(&config)
        }
        Commands::Fetch { source, output } => {
            source.apply(&mut config);
            output.apply(&mut config);
            fetch_cmd(&config)
        }
        Commands::Prompt { output } => {
            output.apply(&mut config);
            prompt_cmd(&config)
        }
        Commands::Table { output } => {
            output.apply(&mut config);
            table_cmd(&config)
        }
    }
}

fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ScoutConfig> {
    match path {
        Some(path) => ScoutConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ScoutConfig::default()),
    }
}

/// `--help` and `--version` exit cleanly; real usage errors exit with 1.
fn parse_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        EXIT_USAGE
    } else {
        0
    }
}

fn exit_code(err: &PipelineError) -> i32 {
    match err {
        PipelineError::Config(_) | PipelineError::Prompt(_) => EXIT_USAGE,
        PipelineError::Fetch(_) => EXIT_FETCH,
        PipelineError::Projection(_) | PipelineError::Write(_) | PipelineError::Read(_) => {
            EXIT_TABLE
        }
        PipelineError::Inference(_) => EXIT_INFERENCE,
    }
}

fn fail(err: PipelineError) -> ! {
    error!("{err}");
    std::process::exit(exit_code(&err));
}

fn provider_for(config: &ScoutConfig) -> GeckoTerminalProvider {
    GeckoTerminalProvider::with_base_url(&config.source.base_url, config.fetch_timeout())
        .unwrap_or_else(|e| fail(e.into()))
}

fn run_cmd(config: &ScoutConfig) -> Result<()> {
    let provider = provider_for(config);
    let client = OllamaClient::new(&config.inference.host, config.inference_timeout())
        .unwrap_or_else(|e| fail(e.into()));

    let outcome = run_pipeline(config, &provider, &client).unwrap_or_else(|e| fail(e));
    if !outcome.refresh.skipped.is_empty() {
        eprintln!(
            "Skipped {} invalid record(s); see log for details",
            outcome.refresh.skipped.len()
        );
    }

    if let Err(e) = print_response(outcome.response)? {
        fail(e.into());
    }
    Ok(())
}

/// Write the analysis to stdout, flushing after each streamed fragment.
///
/// The outer `Result` is stdout I/O; the inner one is the inference stream.
fn print_response(response: InferenceResponse) -> Result<Result<(), InferenceError>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match response {
        InferenceResponse::Complete(text) => writeln!(out, "{text}")?,
        InferenceResponse::Streaming(stream) => {
            for chunk in stream {
                match chunk {
                    Ok(fragment) => {
                        out.write_all(fragment.as_bytes())?;
                        out.flush()?;
                    }
                    Err(e) => {
                        writeln!(out)?;
                        return Ok(Err(e));
                    }
                }
            }
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(Ok(()))
}

fn fetch_cmd(config: &ScoutConfig) -> Result<()> {
    config.validate().unwrap_or_else(|e| fail(e.into()));
    let provider = provider_for(config);

    let summary = refresh_table(config, &provider).unwrap_or_else(|e| fail(e));
    println!(
        "Wrote {} row(s) to {}",
        summary.rows_written,
        summary.table_path.display()
    );
    for skipped in &summary.skipped {
        println!("  skipped: {skipped}");
    }
    println!("  hash: {}", summary.meta.data_hash);
    Ok(())
}

fn prompt_cmd(config: &ScoutConfig) -> Result<()> {
    config.validate().unwrap_or_else(|e| fail(e.into()));
    let template = load_template(config).unwrap_or_else(|e| fail(e.into()));

    let prepared = prompt_from_table(&table_for(config), &template).unwrap_or_else(|e| fail(e));
    println!("{}", prepared.prompt);
    Ok(())
}

fn table_cmd(config: &ScoutConfig) -> Result<()> {
    let table = table_for(config);
    let rows = table
        .read()
        .unwrap_or_else(|e| fail(PipelineError::Read(e)));

    println!("Table: {}", table.path().display());
    println!("  rows: {}", rows.len());

    match table.read_meta() {
        Some(meta) => {
            println!(
                "  query: {}/{} ({})",
                meta.query.network, meta.query.dex, meta.query.interval
            );
            println!("  written: {}", meta.written_at.to_rfc3339());
            println!("  recorded rows: {}", meta.row_count);
            println!("  hash: {}", meta.data_hash);
            let status = match table.matches_meta() {
                Some(true) => "matches",
                Some(false) => "MODIFIED since last fetch",
                None => "unknown",
            };
            println!("  contents: {status}");
        }
        None => println!("  no metadata at {}", table.meta_path().display()),
    }
    Ok(())
}
