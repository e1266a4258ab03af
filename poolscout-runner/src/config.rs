//! Serializable pipeline configuration.
//!
//! Every field has a default, so an empty TOML file is a valid configuration
//! that reproduces the stock run: Solana pump-fun pools over 5 minutes,
//! analysed by `0xroyce/plutus` on a local Ollama.

use poolscout_core::data::geckoterminal::DEFAULT_BASE_URL;
use poolscout_core::data::{BatchPolicy, TrendingInterval, TrendingQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Body keys owned by the payload itself; generation options may not shadow them.
const RESERVED_OPTION_KEYS: [&str; 3] = ["model", "prompt", "stream"];

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoutConfig {
    pub source: SourceConfig,
    pub inference: InferenceConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    pub prompt: PromptConfig,
}

/// Where trending pools come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub network: String,
    pub dex: String,
    pub interval: TrendingInterval,
    /// API root, without the `/networks/...` suffix.
    pub base_url: String,
    /// Per-request timeout in seconds. `0` disables it.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            network: "solana".into(),
            dex: "pump-fun".into(),
            interval: TrendingInterval::FiveMinutes,
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
        }
    }
}

/// The local inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub model: String,
    pub host: String,
    pub stream: bool,
    /// Per-request timeout in seconds. `0` (the default) waits indefinitely.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: "0xroyce/plutus".into(),
            host: "http://localhost:11434".into(),
            stream: false,
            timeout_secs: 0,
        }
    }
}

/// Sampling options sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    /// Any further numeric options, passed through verbatim.
    pub extra: BTreeMap<String, f64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 0.9,
            extra: BTreeMap::new(),
        }
    }
}

impl GenerationConfig {
    /// All options as they appear in the request body.
    ///
    /// `temperature` and `top_p` win over same-named `extra` entries.
    pub fn to_options(&self) -> BTreeMap<String, f64> {
        let mut options = self.extra.clone();
        options.insert("temperature".into(), self.temperature);
        options.insert("top_p".into(), self.top_p);
        options
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub table_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from("data/trending_pools.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub on_invalid_record: BatchPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    /// Replaces the built-in template when set.
    pub template_path: Option<PathBuf>,
}

impl ScoutConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: ScoutConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.query()?;

        if self.inference.model.trim().is_empty() {
            return Err(ConfigError::Invalid("inference.model must not be empty".into()));
        }
        let host = self.inference.host.trim();
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "inference.host must be an http(s) URL, got '{host}'"
            )));
        }

        for (key, value) in self.generation.to_options() {
            if RESERVED_OPTION_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "generation option '{key}' collides with a request field"
                )));
            }
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "generation option '{key}' must be finite, got {value}"
                )));
            }
        }

        if self.output.table_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.table_path must not be empty".into()));
        }
        Ok(())
    }

    /// The trending-pools query described by `[source]`.
    pub fn query(&self) -> Result<TrendingQuery, ConfigError> {
        TrendingQuery::new(
            self.source.network.as_str(),
            self.source.dex.as_str(),
            self.source.interval,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.source.timeout_secs)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.inference.timeout_secs)
    }
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
