// src/utils/errors.rs

use redis::RedisError;

/// Errors coming from the upstream option-chain provider (HTTP, JSON, payload shape).
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("upstream request timed out")]
    Timeout,
}

// Timeouts are surfaced on their own so the cycle log says what actually happened
impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Http(err)
        }
    }
}

/// Read/write failures against the series store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] RedisError),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store: {0}")]
    Backend(String),
}

/// Read-side failures. Never substituted with stale or zero data.
#[derive(thiserror::Error, Debug)]
pub enum AnalyticsError {
    #[error("no data for {symbol}:{strike}")]
    NoData { symbol: String, strike: i64 },
    #[error("ratio undefined: call OI change is zero")]
    DivisionUndefined,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one symbol's ingestion cycle when it could not run to the store.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("no strike above spot {spot}")]
    NoAtm { spot: f64 },
}

/// Missing or unusable startup configuration. Fatal.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing from env")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
