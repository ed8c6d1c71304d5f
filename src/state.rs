// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use crate::db::store::SeriesStore;
use crate::services::{
    analytics::{self, StrikePoint, TotalsPoint},
    chain::{live_view, strike_list, LiveStrike, SortedChain},
    fetcher::OptionChainSource,
    ingestion::{CycleReport, Ingestor},
    scheduler::{PollingController, PollingState},
    timeseries,
    trading_hours::{Clock, TradingCalendar},
};
use crate::utils::errors::{AnalyticsError, StoreError, UpstreamError};

/// Everything the HTTP surface and the schedulers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub symbols: Arc<Vec<String>>,
    pub source: Arc<dyn OptionChainSource>,
    pub store: Arc<dyn SeriesStore>,
    pub ingestor: Arc<Ingestor>,
    pub controller: Arc<PollingController>,
    pub calendar: Arc<TradingCalendar>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn OptionChainSource>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
        symbols: Vec<String>,
        poll_every: Duration,
        concurrency: usize,
    ) -> Self {
        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&source),
            Arc::clone(&store),
            Arc::clone(&clock),
            concurrency,
        ));
        let controller = Arc::new(PollingController::new(
            Arc::clone(&ingestor),
            symbols.clone(),
            poll_every,
        ));
        Self {
            symbols: Arc::new(symbols),
            source,
            store,
            ingestor,
            controller,
            calendar: Arc::new(calendar),
            clock,
        }
    }

    // ─── Ingestion side ──────────────────────────────────────────────────────

    /// One cycle over every tracked symbol.
    pub async fn ingest(&self) -> CycleReport {
        self.ingestor.ingest_all(&self.symbols).await
    }

    pub async fn reset_store(&self, symbols: &[String]) -> Result<usize, StoreError> {
        timeseries::reset(self.store.as_ref(), symbols).await
    }

    pub fn start_polling(&self) -> bool {
        self.controller.start()
    }

    pub fn stop_polling(&self) -> bool {
        self.controller.stop()
    }

    pub fn polling_state(&self) -> PollingState {
        self.controller.state()
    }

    // ─── Read side ───────────────────────────────────────────────────────────

    pub async fn read_totals(&self, symbol: &str) -> Result<Vec<TotalsPoint>, AnalyticsError> {
        analytics::read_totals(self.store.as_ref(), symbol).await
    }

    pub async fn read_strike(
        &self,
        symbol: &str,
        strike: i64,
    ) -> Result<Vec<StrikePoint>, AnalyticsError> {
        analytics::read_strike(self.store.as_ref(), symbol, strike).await
    }

    /// `None` when the chain is too short to infer a strike increment.
    pub async fn list_strikes(&self, symbol: &str) -> Result<Option<Vec<i64>>, UpstreamError> {
        let raw = self.source.fetch(symbol, None).await?;
        Ok(strike_list(&SortedChain::new(raw.rows), raw.spot))
    }

    pub async fn list_expiries(&self, symbol: &str) -> Result<Vec<String>, UpstreamError> {
        self.source.expiries(symbol).await
    }

    pub async fn live_view(
        &self,
        symbol: &str,
        expiry: Option<&str>,
    ) -> Result<Vec<LiveStrike>, UpstreamError> {
        let raw = self.source.fetch(symbol, expiry).await?;
        Ok(live_view(&SortedChain::new(raw.rows), raw.spot))
    }

    // ─── Calendar ────────────────────────────────────────────────────────────

    pub fn is_trading_day_today(&self) -> bool {
        self.calendar.is_trading_day(self.clock.now().date_naive())
    }

    pub fn is_market_open_now(&self) -> bool {
        self.calendar.is_market_open(&self.clock.now())
    }
}
