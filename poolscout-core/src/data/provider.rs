//! Pool provider trait and structured error types.
//!
//! The PoolProvider trait abstracts over trending-pool sources so the
//! pipeline can run against GeckoTerminal in production and an in-memory
//! provider in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One pool object exactly as the provider returned it.
///
/// Consumed immediately by [`crate::data::project`]; nothing downstream of the
/// projector sees a raw record.
pub type RawPoolRecord = serde_json::Value;

/// Structured error types for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response format changed: {0}")]
    MalformedBody(String),
}

/// Ranking window accepted by the trending-pools endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrendingInterval {
    #[default]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
}

impl TrendingInterval {
    pub const ALL: [TrendingInterval; 4] = [
        TrendingInterval::FiveMinutes,
        TrendingInterval::OneHour,
        TrendingInterval::SixHours,
        TrendingInterval::OneDay,
    ];

    /// Wire form used in the `duration` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingInterval::FiveMinutes => "5m",
            TrendingInterval::OneHour => "1h",
            TrendingInterval::SixHours => "6h",
            TrendingInterval::OneDay => "24h",
        }
    }
}

impl fmt::Display for TrendingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendingInterval {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s.trim())
            .ok_or_else(|| {
                FetchError::InvalidRequest(format!(
                    "unsupported interval '{s}' (valid: 5m, 1h, 6h, 24h)"
                ))
            })
    }
}

/// Parameters of one trending-pools request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingQuery {
    pub network: String,
    pub dex: String,
    pub interval: TrendingInterval,
}

impl TrendingQuery {
    /// Build a query, rejecting blank network or DEX identifiers.
    pub fn new(
        network: impl Into<String>,
        dex: impl Into<String>,
        interval: TrendingInterval,
    ) -> Result<Self, FetchError> {
        let query = Self {
            network: network.into().trim().to_string(),
            dex: dex.into().trim().to_string(),
            interval,
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.network.trim().is_empty() {
            return Err(FetchError::InvalidRequest(
                "network identifier must not be empty".into(),
            ));
        }
        if self.dex.trim().is_empty() {
            return Err(FetchError::InvalidRequest(
                "dex identifier must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Trait for trending-pool sources.
///
/// Implementations make a single attempt per call. Retrying is left to the
/// caller, and the pipeline does not retry.
pub trait PoolProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the current trending pools for a network/DEX/interval.
    fn fetch_trending_pools(&self, query: &TrendingQuery)
        -> Result<Vec<RawPoolRecord>, FetchError>;
}
