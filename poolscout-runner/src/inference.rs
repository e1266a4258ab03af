//! Inference client for a locally hosted Ollama-compatible service.
//!
//! One POST to `{host}/api/generate` per call, no retries. Two response modes:
//!
//! - **Buffered** (`stream = false`): the whole body is one JSON object and
//!   its `response` field is returned as [`InferenceResponse::Complete`].
//! - **Incremental** (`stream = true`): the body is newline-delimited JSON and
//!   is exposed as a [`ChunkStream`], a single-pass iterator yielding each
//!   line's `response` fragment in arrival order.
//!
//! Decode policy for the stream is abort-on-first-error: a line that does not
//! decode yields one `Err` and the stream is exhausted from then on.

use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Lines};
use std::iter::FusedIterator;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode inference response: {0}")]
    Decode(String),

    #[error("inference service reported an error: {0}")]
    Service(String),
}

/// Request body for `/api/generate`.
///
/// Generation options are flattened into the top level of the JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(flatten)]
    pub options: BTreeMap<String, f64>,
}

/// One buffered response, or one line of a streamed response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn decode_chunk(text: &str) -> Result<GenerateChunk, InferenceError> {
    let chunk: GenerateChunk =
        serde_json::from_str(text).map_err(|e| InferenceError::Decode(e.to_string()))?;
    match chunk.error {
        Some(message) => Err(InferenceError::Service(message)),
        None => Ok(chunk),
    }
}

/// Result of a generate call.
#[derive(Debug)]
pub enum InferenceResponse {
    Complete(String),
    Streaming(ChunkStream),
}

impl InferenceResponse {
    /// Drain the response into a single string.
    ///
    /// For a stream this consumes every remaining fragment and stops at the
    /// first error.
    pub fn into_text(self) -> Result<String, InferenceError> {
        match self {
            InferenceResponse::Complete(text) => Ok(text),
            InferenceResponse::Streaming(stream) => stream.collect(),
        }
    }
}

/// Pull-based stream of response fragments.
///
/// Single pass: fragments come out in the order the service emitted them and
/// cannot be replayed. The stream is exhausted after the `done` line, after
/// end of body, or after the first error; from then on `next` returns `None`.
pub struct ChunkStream<R = Box<dyn BufRead + Send>> {
    lines: Lines<R>,
    exhausted: bool,
    yielded: usize,
}

impl<R: BufRead> ChunkStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            exhausted: false,
            yielded: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fragments handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn fail(&mut self, err: InferenceError) -> Option<Result<String, InferenceError>> {
        self.exhausted = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for ChunkStream<R> {
    type Item = Result<String, InferenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                None => {
                    self.exhausted = true;
                    return None;
                }
                Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    return self.fail(InferenceError::Decode(e.to_string()));
                }
                Some(Err(e)) => return self.fail(InferenceError::Transport(e.to_string())),
                Some(Ok(line)) => line,
            };

            if line.trim().is_empty() {
                continue;
            }

            let chunk = match decode_chunk(&line) {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(e),
            };
            if chunk.done {
                self.exhausted = true;
            }
            self.yielded += 1;
            return Some(Ok(chunk.response));
        }
    }
}

impl<R: BufRead> FusedIterator for ChunkStream<R> {}

impl<R> fmt::Debug for ChunkStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("exhausted", &self.exhausted)
            .field("yielded", &self.yielded)
            .finish()
    }
}

/// Anything that can turn a payload into generated text.
pub trait InferenceService {
    fn generate(&self, payload: &PromptPayload) -> Result<InferenceResponse, InferenceError>;
}

/// Blocking client for the Ollama `/api/generate` endpoint.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    host: String,
}

impl OllamaClient {
    /// `timeout` of `None` lets a generation run as long as the service needs.
    pub fn new(host: impl Into<String>, timeout: Option<Duration>) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

impl InferenceService for OllamaClient {
    fn generate(&self, payload: &PromptPayload) -> Result<InferenceResponse, InferenceError> {
        let url = self.generate_url();
        info!("Sending request to: {url}");
        if log::log_enabled!(log::Level::Debug) {
            let pretty = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|e| format!("<unserializable payload: {e}>"));
            debug!("Payload: {pretty}");
        }

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = resp.status();
        info!("Response status code: {}", status.as_u16());

        if status != StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if payload.stream {
            let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(resp));
            return Ok(InferenceResponse::Streaming(ChunkStream::new(reader)));
        }

        let body = resp
            .text()
            .map_err(|e| InferenceError::Transport(format!("failed to read body: {e}")))?;
        let chunk = decode_chunk(&body)?;
        Ok(InferenceResponse::Complete(chunk.response))
    }
}
