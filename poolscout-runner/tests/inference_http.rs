//! Integration tests for the Ollama client against a local stub.

mod support;

use poolscout_runner::inference::{
    InferenceError, InferenceResponse, InferenceService, OllamaClient, PromptPayload,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use support::{dead_url, serve_once};

fn payload(stream: bool) -> PromptPayload {
    PromptPayload {
        model: "0xroyce/plutus".into(),
        prompt: "Which pool?".into(),
        stream,
        options: BTreeMap::from([("temperature".to_string(), 0.5), ("top_p".to_string(), 0.9)]),
    }
}

fn request_body(request: &str) -> Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[test]
fn buffered_request_posts_flat_json_body() {
    let server = serve_once(
        "200 OK",
        "application/json",
        r#"{"model":"0xroyce/plutus","response":"Pool A looks safest.","done":true}"#,
    );
    let client = OllamaClient::new(&server.url, None).unwrap();

    let response = client.generate(&payload(false)).unwrap();
    match response {
        InferenceResponse::Complete(text) => assert_eq!(text, "Pool A looks safest."),
        other => panic!("expected Complete, got {other:?}"),
    }

    let request = server.request();
    assert!(request.starts_with("POST /api/generate HTTP/1.1"));
    assert_eq!(
        request_body(&request),
        json!({
            "model": "0xroyce/plutus",
            "prompt": "Which pool?",
            "stream": false,
            "temperature": 0.5,
            "top_p": 0.9
        })
    );
}

#[test]
fn streamed_fragments_match_buffered_text() {
    let fragments = ["Pool", " A", " looks", " safest."];
    let mut body = String::new();
    for f in fragments {
        body.push_str(&json!({"response": f, "done": false}).to_string());
        body.push('\n');
    }
    body.push_str(&json!({"response": "", "done": true}).to_string());
    body.push('\n');

    let server = serve_once("200 OK", "application/x-ndjson", &body);
    let client = OllamaClient::new(&server.url, None).unwrap();

    let InferenceResponse::Streaming(stream) = client.generate(&payload(true)).unwrap() else {
        panic!("expected a stream");
    };
    let chunks: Vec<String> = stream.map(Result::unwrap).collect();

    assert_eq!(chunks[..fragments.len()], fragments);
    assert_eq!(chunks.concat(), "Pool A looks safest.");
    assert_eq!(request_body(&server.request())["stream"], json!(true));
}

#[test]
fn stream_with_bad_line_aborts() {
    let body = "{\"response\":\"ok\"}\n{broken\n{\"response\":\"never\"}\n";
    let server = serve_once("200 OK", "application/x-ndjson", body);
    let client = OllamaClient::new(&server.url, None).unwrap();

    let response = client.generate(&payload(true)).unwrap();
    assert!(matches!(response.into_text(), Err(InferenceError::Decode(_))));
    server.request();
}

#[test]
fn non_200_status_is_error() {
    let server = serve_once(
        "404 Not Found",
        "application/json",
        r#"{"error":"model '0xroyce/plutus' not found"}"#,
    );
    let client = OllamaClient::new(&server.url, None).unwrap();

    match client.generate(&payload(false)) {
        Err(InferenceError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
    server.request();
}

#[test]
fn malformed_buffered_body_is_decode_error() {
    let server = serve_once("200 OK", "text/plain", "definitely not json");
    let client = OllamaClient::new(&server.url, None).unwrap();
    assert!(matches!(
        client.generate(&payload(false)),
        Err(InferenceError::Decode(_))
    ));
    server.request();
}

#[test]
fn unreachable_service_is_transport_error() {
    let client = OllamaClient::new(dead_url(), None).unwrap();
    assert!(matches!(
        client.generate(&payload(false)),
        Err(InferenceError::Transport(_))
    ));
}
