//! One ingestion cycle: fetch → sort/locate ATM → aggregate → persist, per
//! symbol. Symbols run concurrently (bounded); a symbol's own writes are
//! sequential and guarded so two cycles never interleave on one symbol.

use dashmap::DashMap;
use futures::{stream, StreamExt};
use metrics::{histogram, increment_counter};
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;

use crate::db::store::SeriesStore;
use crate::services::chain::{aggregate, AtmRule, SortedChain};
use crate::services::fetcher::OptionChainSource;
use crate::services::timeseries::{persist, PersistReport};
use crate::services::trading_hours::{format_hhmm, Clock};
use crate::utils::errors::IngestError;

#[derive(Debug)]
pub struct SymbolReport {
    pub symbol: String,
    pub spot: f64,
    pub atm_strike: f64,
    pub time: String,
    pub persisted: PersistReport,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub completed: Vec<SymbolReport>,
    pub failed: Vec<(String, IngestError)>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.completed.iter().all(|r| r.persisted.failed.is_empty())
    }

    /// Serializable view for the admin surface.
    pub fn summary(&self) -> CycleSummary {
        CycleSummary {
            completed: self
                .completed
                .iter()
                .map(|r| SymbolSummary {
                    symbol: r.symbol.clone(),
                    spot: r.spot,
                    atm: r.atm_strike,
                    time: r.time.clone(),
                    stored: r.persisted.written(),
                    failed_strikes: r.persisted.failed.iter().map(|(strike, _)| *strike).collect(),
                })
                .collect(),
            failed: self
                .failed
                .iter()
                .map(|(symbol, e)| SymbolFailure {
                    symbol: symbol.clone(),
                    error: e.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub spot: f64,
    pub atm: f64,
    pub time: String,
    pub stored: usize,
    #[serde(rename = "failedStrikes")]
    pub failed_strikes: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CycleSummary {
    pub completed: Vec<SymbolSummary>,
    pub failed: Vec<SymbolFailure>,
}

pub struct Ingestor {
    source: Arc<dyn OptionChainSource>,
    store: Arc<dyn SeriesStore>,
    clock: Arc<dyn Clock>,
    concurrency: usize,
    guards: DashMap<String, Arc<Mutex<()>>>,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn OptionChainSource>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            concurrency: concurrency.max(1),
            guards: DashMap::new(),
        }
    }

    fn guard(&self, symbol: &str) -> Arc<Mutex<()>> {
        self.guards.entry(symbol.to_string()).or_default().clone()
    }

    /// Runs one cycle for `symbol`. Waits if another cycle holds the symbol.
    pub async fn ingest_symbol(&self, symbol: &str) -> Result<SymbolReport, IngestError> {
        let guard = self.guard(symbol);
        let _held = guard.lock().await;
        let started = Instant::now();

        let raw = self.source.fetch(symbol, None).await?;
        let spot = raw.spot;
        let chain = SortedChain::new(raw.rows);

        let atm = chain
            .locate_atm(spot, AtmRule::StrictlyAbove)
            .ok_or(IngestError::NoAtm { spot })?;

        let time = format_hhmm(&self.clock.now());
        let agg = aggregate(&chain, atm, spot, &time);
        let persisted = persist(self.store.as_ref(), symbol, &agg).await;

        let elapsed = started.elapsed();
        histogram!(
            "oi_ingest_symbol_ms",
            elapsed.as_secs_f64() * 1_000.0,
            "symbol" => symbol.to_string(),
        );
        log::info!(
            "ingest: {symbol} spot={spot} atm={} stored={} failed={} in {:?}",
            atm.strike,
            persisted.written(),
            persisted.failed.len(),
            elapsed
        );

        Ok(SymbolReport {
            symbol: symbol.to_string(),
            spot,
            atm_strike: atm.strike,
            time,
            persisted,
        })
    }

    /// One cycle across `symbols`. Awaits every symbol; failures are isolated
    /// and collected, never propagated.
    pub async fn ingest_all(&self, symbols: &[String]) -> CycleReport {
        let outcomes: Vec<(String, Result<SymbolReport, IngestError>)> =
            stream::iter(symbols.iter().cloned())
                .map(|symbol| async move {
                    let outcome = self.ingest_symbol(&symbol).await;
                    (symbol, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = CycleReport::default();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(r) => {
                    increment_counter!("oi_ingest_symbol_total", "symbol" => symbol, "outcome" => "ok");
                    report.completed.push(r);
                }
                Err(e) => {
                    log::error!("ingest: {symbol} skipped this cycle: {e}");
                    increment_counter!(
                        "oi_ingest_symbol_total",
                        "symbol" => symbol.clone(),
                        "outcome" => "error",
                    );
                    report.failed.push((symbol, e));
                }
            }
        }
        report
    }
}
