use serde::{Deserialize, Serialize};
use std::fmt;

/// Strike slot reserved for the inner-window totals of each cycle.
pub const TOTALS_STRIKE: i64 = 0;

/// One observation appended to a strike's series. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub spot: f64,
    /// `HH:MM`, market timezone
    pub time: String,
    #[serde(rename = "putsCoi")]
    pub puts_coi: f64,
    #[serde(rename = "callsCoi")]
    pub calls_coi: f64,
}

/// Composite `(symbol, strike)` identifier of one series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub strike: i64,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, strike: i64) -> Self {
        Self {
            symbol: symbol.into(),
            strike,
        }
    }

    pub fn totals(symbol: impl Into<String>) -> Self {
        Self::new(symbol, TOTALS_STRIKE)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.strike)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub symbol: String,
    #[serde(rename = "strikePrice")]
    pub strike_price: i64,
    #[serde(rename = "oiArray")]
    pub series: Vec<Snapshot>,
}

impl StrikeRecord {
    pub fn latest(&self) -> Option<&Snapshot> {
        self.series.last()
    }
}
