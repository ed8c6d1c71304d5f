//! Snapshot fetcher: pulls one option-chain snapshot per symbol from the
//! upstream provider. Failures are per symbol and never panic the cycle.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::settings::Settings;
use crate::utils::errors::UpstreamError;

/// One strike of the upstream chain. Never persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOptionRow {
    pub strike_price: f64,
    #[serde(default)]
    pub calls_oi: f64,
    #[serde(default)]
    pub calls_change_oi: f64,
    #[serde(default)]
    pub puts_oi: f64,
    #[serde(default)]
    pub puts_change_oi: f64,
    /// Spot; the provider repeats it on every row
    #[serde(default)]
    pub index_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawChainSnapshot {
    /// Index level at fetch time (`index_close` of the first row)
    pub spot: f64,
    pub rows: Vec<RawOptionRow>,
    pub expiries: Vec<String>,
}

#[async_trait]
pub trait OptionChainSource: Send + Sync {
    /// `expiry = None` selects the provider's current cycle.
    async fn fetch(&self, symbol: &str, expiry: Option<&str>)
        -> Result<RawChainSnapshot, UpstreamError>;

    /// Expiry labels offered for `symbol`.
    async fn expiries(&self, symbol: &str) -> Result<Vec<String>, UpstreamError>;
}

/* ─────────────────────────────────────────  Payload ────── */

#[derive(Debug, Deserialize)]
struct ChainEnvelope {
    #[serde(rename = "resultData")]
    result_data: Option<ChainResult>,
}

#[derive(Debug, Deserialize)]
struct ChainResult {
    #[serde(rename = "opDatas", default)]
    op_datas: Option<Vec<RawOptionRow>>,
    #[serde(rename = "opExpiryDates", default)]
    op_expiry_dates: Option<Vec<String>>,
}

/// Decodes the provider envelope `{ resultData: { opDatas, opExpiryDates } }`.
pub fn parse_chain(body: &str) -> Result<RawChainSnapshot, UpstreamError> {
    let envelope: ChainEnvelope = serde_json::from_str(body)?;
    let result = envelope
        .result_data
        .ok_or_else(|| UpstreamError::Malformed("missing resultData".into()))?;

    let rows = result.op_datas.unwrap_or_default();
    let spot = rows
        .first()
        .ok_or_else(|| UpstreamError::Malformed("no option rows".into()))?
        .index_close
        .ok_or_else(|| UpstreamError::Malformed("missing index_close".into()))?;

    Ok(RawChainSnapshot {
        spot,
        rows,
        expiries: result.op_expiry_dates.unwrap_or_default(),
    })
}

/* ─────────────────────────────────────────  HTTP adapter ────── */

/// Production adapter for the niftytrader option-chain endpoint.
#[derive(Clone)]
pub struct NiftyTraderClient {
    http: Client,
    url: String,
}

impl NiftyTraderClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, UpstreamError> {
        Self::new(settings.upstream_url.clone(), settings.upstream_timeout)
    }

    async fn get_chain(&self, params: &[(&str, &str)]) -> Result<RawChainSnapshot, UpstreamError> {
        let resp = self.http.get(&self.url).query(params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        parse_chain(&body)
    }
}

#[async_trait]
impl OptionChainSource for NiftyTraderClient {
    async fn fetch(
        &self,
        symbol: &str,
        expiry: Option<&str>,
    ) -> Result<RawChainSnapshot, UpstreamError> {
        match expiry {
            Some(exp) => self.get_chain(&[("symbol", symbol), ("expiryDate", exp)]).await,
            None => self.get_chain(&[("symbol", symbol)]).await,
        }
    }

    async fn expiries(&self, symbol: &str) -> Result<Vec<String>, UpstreamError> {
        let chain = self
            .get_chain(&[("symbol", symbol), ("expiryDate", "current")])
            .await?;
        Ok(chain.expiries)
    }
}
