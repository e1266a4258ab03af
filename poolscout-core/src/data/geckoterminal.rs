//! GeckoTerminal trending-pools provider.
//!
//! Fetches `/networks/{network}/trending_pools` from the public v2 API. One
//! attempt per call: no retry, no backoff, no circuit breaker. A transport
//! error or non-2xx status is returned to the caller as a [`FetchError`].

use super::provider::{FetchError, PoolProvider, RawPoolRecord, TrendingQuery};
use log::{debug, info};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Trending-pools response envelope. Only `data` is used.
#[derive(Debug, Deserialize)]
struct TrendingResponse {
    data: Vec<RawPoolRecord>,
}

/// GeckoTerminal data provider.
pub struct GeckoTerminalProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl GeckoTerminalProvider {
    /// Provider pointed at the public API.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// Provider pointed at an alternative API root (mirror or local stub).
    ///
    /// `timeout` of `None` disables the per-request timeout entirely.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let parsed = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            FetchError::InvalidRequest(format!("invalid base URL {base_url}: {e}"))
        })?;
        if parsed.cannot_be_a_base() {
            let reason = format!("base URL {base_url} cannot carry a path");
            return Err(FetchError::InvalidRequest(reason));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("poolscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Build the trending-pools URL for a query.
    ///
    /// Network and dex are percent-encoded as a path segment and a query
    /// value respectively.
    pub fn trending_url(&self, query: &TrendingQuery) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["networks", query.network.as_str(), "trending_pools"]);
        }
        url.query_pairs_mut()
            .append_pair("include", &query.dex)
            .append_pair("page", "1")
            .append_pair("duration", query.interval.as_str());
        url
    }

    /// Decode a trending-pools response body into raw pool records.
    pub fn parse_response(body: &str) -> Result<Vec<RawPoolRecord>, FetchError> {
        let parsed: TrendingResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::MalformedBody(format!("trending pools: {e}")))?;
        Ok(parsed.data)
    }
}

impl PoolProvider for GeckoTerminalProvider {
    fn name(&self) -> &str {
        "geckoterminal"
    }

    fn fetch_trending_pools(
        &self,
        query: &TrendingQuery,
    ) -> Result<Vec<RawPoolRecord>, FetchError> {
        query.validate()?;

        let url = self.trending_url(query);
        info!("Fetching trending pools: {url}");

        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        info!("Provider responded with HTTP {status}");

        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;
        let pools = Self::parse_response(&body)?;
        debug!("Provider returned {} pool record(s)", pools.len());
        Ok(pools)
    }
}
