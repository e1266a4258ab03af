//! End-to-end pipeline scenarios.
//!
//! These tests run the whole fetch → project → write → reload → prompt →
//! generate sequence against in-memory providers and local HTTP stubs, and
//! check what is (and is not) left on disk.

mod support;

use poolscout_core::data::{
    BatchPolicy, FetchError, GeckoTerminalProvider, PoolProvider, ProjectionError, RawPoolRecord,
    TrendingQuery, COLUMNS,
};
use poolscout_runner::{
    run_pipeline, InferenceError, InferenceResponse, InferenceService, OllamaClient,
    PipelineError, PromptPayload, ScoutConfig,
};
use serde_json::{json, Value};
use std::cell::Cell;
use std::path::Path;
use support::serve_once;

struct FixedProvider(Vec<RawPoolRecord>);

impl PoolProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch_trending_pools(&self, _: &TrendingQuery) -> Result<Vec<RawPoolRecord>, FetchError> {
        Ok(self.0.clone())
    }
}

struct DownProvider;

impl PoolProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn fetch_trending_pools(&self, _: &TrendingQuery) -> Result<Vec<RawPoolRecord>, FetchError> {
        Err(FetchError::Status {
            status: 503,
            body: "maintenance".into(),
        })
    }
}

/// Counts calls; fails the test's expectations if it is reached unexpectedly.
#[derive(Default)]
struct CountingService {
    calls: Cell<usize>,
}

impl InferenceService for CountingService {
    fn generate(&self, _: &PromptPayload) -> Result<InferenceResponse, InferenceError> {
        self.calls.set(self.calls.get() + 1);
        Ok(InferenceResponse::Complete("analysis".into()))
    }
}

fn pool(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "type": "pool",
        "attributes": {
            "name": name,
            "base_token_price_usd": "0.0153",
            "price_change_percentage": {"m5": "3.1", "h1": "12.0"},
            "volume_usd": {"m5": "4410.2", "h24": "902112.7"},
            "reserve_in_usd": "310442.9",
            "transactions": {"m5": {"buys": 41, "sells": 18, "buyers": 35, "sellers": 15}}
        }
    })
}

fn pool_without_reserve(id: &str) -> Value {
    let mut raw = pool(id, "NORES / SOL");
    raw["attributes"]
        .as_object_mut()
        .unwrap()
        .remove("reserve_in_usd");
    raw
}

fn config_in(dir: &Path) -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.output.table_path = dir.join("data/trending_pools.csv");
    config
}

fn request_body(request: &str) -> Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[test]
fn fetch_failure_leaves_existing_table_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::create_dir_all(config.output.table_path.parent().unwrap()).unwrap();
    std::fs::write(&config.output.table_path, "previous run\n").unwrap();

    let service = CountingService::default();
    let err = run_pipeline(&config, &DownProvider, &service).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Fetch(FetchError::Status { status: 503, .. })
    ));
    assert_eq!(
        std::fs::read_to_string(&config.output.table_path).unwrap(),
        "previous run\n"
    );
    assert_eq!(service.calls.get(), 0);
}

#[test]
fn fetch_failure_creates_no_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let service = CountingService::default();
    assert!(run_pipeline(&config, &DownProvider, &service).is_err());
    assert!(!config.output.table_path.exists());
    assert!(!dir.path().join("data/trending_pools.csv.meta.json").exists());
}

#[test]
fn empty_provider_response_still_sends_well_formed_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve_once(
        "200 OK",
        "application/json",
        r#"{"response":"No pools to analyse.","done":true}"#,
    );
    let mut config = config_in(dir.path());
    config.inference.host = server.url.clone();

    let client = OllamaClient::new(&config.inference.host, None).unwrap();
    let outcome = run_pipeline(&config, &FixedProvider(vec![]), &client).unwrap();

    let table = std::fs::read_to_string(&config.output.table_path).unwrap();
    assert_eq!(table.trim_end(), COLUMNS.join(","));
    assert_eq!(outcome.refresh.rows_written, 0);
    assert_eq!(outcome.prompt.rows, 0);
    assert_eq!(outcome.response.into_text().unwrap(), "No pools to analyse.");

    let body = request_body(&server.request());
    assert_eq!(body["model"], json!("0xroyce/plutus"));
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["temperature"], json!(0.5));
    assert_eq!(body["top_p"], json!(0.9));
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.contains("\n[]\n"));
    assert!(!prompt.contains("{market_data}"));
}

#[test]
fn missing_reserve_aborts_batch_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    assert_eq!(config.pipeline.on_invalid_record, BatchPolicy::Abort);

    let provider = FixedProvider(vec![pool("a", "A / SOL"), pool_without_reserve("b")]);
    let service = CountingService::default();
    let err = run_pipeline(&config, &provider, &service).unwrap_err();

    match err {
        PipelineError::Projection(ProjectionError::MissingField { record_id, field }) => {
            assert_eq!(record_id, "b");
            assert_eq!(field, "attributes.reserve_in_usd");
        }
        other => panic!("expected projection error, got {other:?}"),
    }
    assert!(!config.output.table_path.exists());
    assert_eq!(service.calls.get(), 0);
}

#[test]
fn missing_reserve_is_dropped_under_skip_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.pipeline.on_invalid_record = BatchPolicy::Skip;

    let provider = FixedProvider(vec![
        pool("a", "A / SOL"),
        pool_without_reserve("b"),
        pool("c", "C / SOL"),
    ]);
    let service = CountingService::default();
    let outcome = run_pipeline(&config, &provider, &service).unwrap();

    assert_eq!(outcome.refresh.rows_written, 2);
    assert_eq!(outcome.refresh.skipped.len(), 1);
    assert_eq!(outcome.prompt.rows, 2);
    assert!(outcome.prompt.prompt.contains("\"A / SOL\""));
    assert!(!outcome.prompt.prompt.contains("NORES"));
    assert_eq!(service.calls.get(), 1);
}

#[test]
fn full_run_against_both_stubs_streams_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let provider_body = json!({"data": [pool("solana_a", "A / SOL"), pool("solana_b", "B / SOL")]});
    let gecko = serve_once("200 OK", "application/json", &provider_body.to_string());
    let ollama = serve_once(
        "200 OK",
        "application/x-ndjson",
        "{\"response\":\"Pick \"}\n{\"response\":\"B / SOL\"}\n{\"response\":\"\",\"done\":true}\n",
    );

    let mut config = config_in(dir.path());
    config.source.base_url = format!("{}/api/v2", gecko.url);
    config.inference.host = ollama.url.clone();
    config.inference.stream = true;

    let provider = GeckoTerminalProvider::with_base_url(&config.source.base_url, None).unwrap();
    let client = OllamaClient::new(&config.inference.host, None).unwrap();
    let outcome = run_pipeline(&config, &provider, &client).unwrap();

    let InferenceResponse::Streaming(stream) = outcome.response else {
        panic!("expected a stream");
    };
    let chunks: Vec<String> = stream.collect::<Result<_, _>>().unwrap();
    assert_eq!(chunks, ["Pick ", "B / SOL", ""]);

    let expected =
        "GET /api/v2/networks/solana/trending_pools?include=pump-fun&page=1&duration=5m";
    assert!(gecko.request().starts_with(expected));
    let body = request_body(&ollama.request());
    assert_eq!(body["stream"], json!(true));
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.find("solana_a").unwrap() < prompt.find("solana_b").unwrap());

    let meta = outcome.refresh.meta;
    assert_eq!(meta.row_count, 2);
    assert_eq!(meta.query.dex, "pump-fun");
}
