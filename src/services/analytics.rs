//! Read-side derivations over stored series: lakh scaling, OI-diff and PCR.
//! Nothing here writes; reading twice without an ingestion in between yields
//! identical output.

use serde::Serialize;

use crate::db::models::{SeriesKey, Snapshot, StrikeRecord};
use crate::db::store::SeriesStore;
use crate::utils::errors::AnalyticsError;

pub const LAKH: f64 = 100_000.0;

/// Two decimals, half away from zero.
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[inline]
pub fn to_lakhs(v: f64) -> f64 {
    round2(v / LAKH)
}

/// `|put / call|`, negated when puts are not positive. A zero call side has no ratio.
pub fn pcr(put_lac: f64, call_lac: f64) -> Result<f64, AnalyticsError> {
    if call_lac == 0.0 {
        return Err(AnalyticsError::DivisionUndefined);
    }
    let ratio = round2(put_lac / call_lac).abs();
    Ok(if put_lac > 0.0 || ratio == 0.0 { ratio } else { -ratio })
}

#[inline]
pub fn oi_diff(put_lac: f64, call_lac: f64) -> f64 {
    round2(put_lac - call_lac)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsPoint {
    pub spot: f64,
    /// `None` when the call side rounds to zero lakhs
    pub pcr: Option<f64>,
    pub oidiff: f64,
    pub time: String,
    #[serde(rename = "putsCoi")]
    pub puts_coi: f64,
    #[serde(rename = "callsCoi")]
    pub calls_coi: f64,
}

impl From<&Snapshot> for TotalsPoint {
    fn from(s: &Snapshot) -> Self {
        let put_lac = to_lakhs(s.puts_coi);
        let call_lac = to_lakhs(s.calls_coi);
        Self {
            spot: s.spot,
            pcr: pcr(put_lac, call_lac).ok(),
            oidiff: oi_diff(put_lac, call_lac),
            time: s.time.clone(),
            puts_coi: put_lac,
            calls_coi: call_lac,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikePoint {
    pub oidiff: f64,
    pub time: String,
}

impl From<&Snapshot> for StrikePoint {
    fn from(s: &Snapshot) -> Self {
        Self {
            oidiff: oi_diff(to_lakhs(s.puts_coi), to_lakhs(s.calls_coi)),
            time: s.time.clone(),
        }
    }
}

async fn load(store: &dyn SeriesStore, key: SeriesKey) -> Result<StrikeRecord, AnalyticsError> {
    match store.find(&key).await? {
        Some(record) => Ok(record),
        None => Err(AnalyticsError::NoData {
            symbol: key.symbol,
            strike: key.strike,
        }),
    }
}

/// Totals series (strike 0) for `symbol`, oldest first.
pub async fn read_totals(
    store: &dyn SeriesStore,
    symbol: &str,
) -> Result<Vec<TotalsPoint>, AnalyticsError> {
    let record = load(store, SeriesKey::totals(symbol)).await?;
    Ok(record.series.iter().map(TotalsPoint::from).collect())
}

/// OI-diff series of one strike, oldest first.
pub async fn read_strike(
    store: &dyn SeriesStore,
    symbol: &str,
    strike: i64,
) -> Result<Vec<StrikePoint>, AnalyticsError> {
    let record = load(store, SeriesKey::new(symbol, strike)).await?;
    Ok(record.series.iter().map(StrikePoint::from).collect())
}
