// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

use oichain_backend::db::store::{MemoryStore, SeriesStore};
use oichain_backend::services::fetcher::{OptionChainSource, RawChainSnapshot, RawOptionRow};
use oichain_backend::services::trading_hours::{FixedClock, MinuteGate, TradingCalendar, MARKET_TZ};
use oichain_backend::state::AppState;
use oichain_backend::utils::errors::UpstreamError;

pub const SPOT: f64 = 100.0;
pub const ATM_STRIKE: i64 = 125;
/// 1000 × Σ(i+1) for i in 12..=32
pub const INNER_PUTS: f64 = 483_000.0;
/// 500 × Σ(i+1) for i in 12..=32
pub const INNER_CALLS: f64 = 241_500.0;

pub fn row(strike: f64, puts_coi: f64, calls_coi: f64, spot: f64) -> RawOptionRow {
    RawOptionRow {
        strike_price: strike,
        calls_oi: calls_coi * 4.0,
        calls_change_oi: calls_coi,
        puts_oi: puts_coi * 4.0,
        puts_change_oi: puts_coi,
        index_close: Some(spot),
    }
}

/// 45 strikes spaced 50 apart around spot 100; the strict ATM is row 22
/// (strike 125). Puts ΔOI = 1000·(i+1), calls ΔOI = 500·(i+1).
pub fn chain45() -> RawChainSnapshot {
    let rows = (0..45)
        .map(|i| {
            let n = (i + 1) as f64;
            row(125.0 + (i as f64 - 22.0) * 50.0, 1_000.0 * n, 500.0 * n, SPOT)
        })
        .collect();
    RawChainSnapshot {
        spot: SPOT,
        rows,
        expiries: vec!["16-Nov-2023".into(), "23-Nov-2023".into()],
    }
}

/// Every strike sits below spot, so no strict ATM exists.
pub fn chain_below_spot() -> RawChainSnapshot {
    let rows = (0..10)
        .map(|i| row(1_000.0 + i as f64 * 50.0, 10.0, 10.0, 5_000.0))
        .collect();
    RawChainSnapshot {
        spot: 5_000.0,
        rows,
        expiries: Vec::new(),
    }
}

/// In-process upstream. Unknown symbols answer 503.
#[derive(Default)]
pub struct FixtureSource {
    chains: HashMap<String, RawChainSnapshot>,
    delay: Duration,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, symbol: &str, chain: RawChainSnapshot) -> Self {
        self.chains.insert(symbol.to_string(), chain);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionChainSource for FixtureSource {
    async fn fetch(
        &self,
        symbol: &str,
        _expiry: Option<&str>,
    ) -> Result<RawChainSnapshot, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.chains
            .get(symbol)
            .cloned()
            .ok_or(UpstreamError::Status(503))
    }

    async fn expiries(&self, symbol: &str) -> Result<Vec<String>, UpstreamError> {
        self.chains
            .get(symbol)
            .map(|c| c.expiries.clone())
            .ok_or(UpstreamError::Status(503))
    }
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Wednesday 15 Nov 2023 (a trading day) at `h:m` IST.
pub fn trading_day_at(h: u32, m: u32) -> DateTime<Tz> {
    MARKET_TZ.with_ymd_and_hms(2023, 11, 15, h, m, 0).unwrap()
}

/// Tuesday 14 Nov 2023, a configured holiday.
pub fn holiday_at(h: u32, m: u32) -> DateTime<Tz> {
    MARKET_TZ.with_ymd_and_hms(2023, 11, 14, h, m, 0).unwrap()
}

pub fn calendar() -> TradingCalendar {
    TradingCalendar::new(
        vec![NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()],
        hm(9, 20),
        hm(15, 30),
        true,
        MinuteGate::Band,
    )
}

pub fn app_state(
    source: Arc<FixtureSource>,
    store: Arc<MemoryStore>,
    now: DateTime<Tz>,
    symbols: &[&str],
    poll_every: Duration,
) -> AppState {
    let source: Arc<dyn OptionChainSource> = source;
    let store: Arc<dyn SeriesStore> = store;
    AppState::new(
        source,
        store,
        Arc::new(FixedClock(now)),
        calendar(),
        symbols.iter().map(|s| s.to_string()).collect(),
        poll_every,
        3,
    )
}
