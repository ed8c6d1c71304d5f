//! Option-chain shaping: ATM location, storage/aggregation windows, the live
//! display view and the canonical strike list.
//!
//! Every function here works on a [`SortedChain`], so the ascending strike
//! order is guaranteed by construction rather than re-checked per call.

use serde::Serialize;
use std::ops::Range;

use crate::db::models::{Snapshot, TOTALS_STRIKE};
use crate::services::analytics::to_lakhs;
use crate::services::fetcher::RawOptionRow;

/// Strikes on each side of ATM kept as individual series.
pub const OUTER_RADIUS: usize = 20;
/// Strikes on each side of ATM summed into the totals record.
pub const INNER_RADIUS: usize = 10;
/// Strikes on each side of ATM in the live view.
pub const LIVE_RADIUS: usize = 10;
/// Increments on each side of ATM in the strike list.
pub const STRIKE_LIST_SPAN: i64 = 5;
/// First row index used to infer the strike increment.
const INCREMENT_PIVOT: usize = 20;

/// Which strike counts as ATM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtmRule {
    /// First strike `> spot`. Storage aggregation uses this.
    StrictlyAbove,
    /// First strike with `strike - spot >= 0`. Live display uses this.
    AtOrAbove,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atm {
    pub index: usize,
    pub strike: f64,
}

/// Upstream rows in ascending strike order (stable numeric sort), one row
/// per stored strike.
#[derive(Debug, Clone, Default)]
pub struct SortedChain {
    rows: Vec<RawOptionRow>,
}

impl SortedChain {
    /// Rows whose strikes round to the same integer collapse onto the first
    /// one upstream sent.
    pub fn new(mut rows: Vec<RawOptionRow>) -> Self {
        rows.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));

        let before = rows.len();
        rows.dedup_by_key(|row| row.strike_price.round() as i64);
        if rows.len() < before {
            log::warn!("chain: dropped {} duplicate strike row(s)", before - rows.len());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[RawOptionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First-match scan. `None` when no strike qualifies.
    pub fn locate_atm(&self, spot: f64, rule: AtmRule) -> Option<Atm> {
        self.rows
            .iter()
            .position(|row| match rule {
                AtmRule::StrictlyAbove => row.strike_price > spot,
                AtmRule::AtOrAbove => row.strike_price - spot >= 0.0,
            })
            .map(|index| Atm {
                index,
                strike: self.rows[index].strike_price,
            })
    }
}

/// Indices within `radius` of `atm`, clamped to the chain.
pub fn window(atm: usize, radius: usize, len: usize) -> Range<usize> {
    let start = atm.saturating_sub(radius);
    let end = atm.saturating_add(radius).saturating_add(1).min(len);
    start.min(end)..end
}

// ─────────────────────────────────────────  Storage aggregation ──────

#[derive(Debug, Clone, PartialEq)]
pub struct StrikeSnapshot {
    pub strike: i64,
    pub snapshot: Snapshot,
}

/// Result of one cycle for one symbol: per-strike entries plus the totals entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub atm: Atm,
    pub records: Vec<StrikeSnapshot>,
    /// Keyed at [`TOTALS_STRIKE`]
    pub totals: Snapshot,
}

impl Aggregation {
    /// Per-strike entries followed by the totals entry, in write order.
    pub fn entries(&self) -> impl Iterator<Item = (i64, &Snapshot)> {
        self.records
            .iter()
            .map(|r| (r.strike, &r.snapshot))
            .chain(std::iter::once((TOTALS_STRIKE, &self.totals)))
    }
}

/// Outer window (±20) becomes per-strike snapshots; the inner window (±10)
/// is summed into the totals snapshot.
pub fn aggregate(chain: &SortedChain, atm: Atm, spot: f64, time: &str) -> Aggregation {
    let rows = chain.rows();
    let mut total_puts = 0.0;
    let mut total_calls = 0.0;
    let mut records = Vec::with_capacity(2 * OUTER_RADIUS + 1);

    for i in window(atm.index, OUTER_RADIUS, rows.len()) {
        let row = &rows[i];

        if i.abs_diff(atm.index) <= INNER_RADIUS {
            total_puts += row.puts_change_oi;
            total_calls += row.calls_change_oi;
        }

        let strike = row.strike_price.round() as i64;
        if strike == TOTALS_STRIKE {
            log::warn!("chain: dropping row with strike {} (totals slot)", row.strike_price);
            continue;
        }

        records.push(StrikeSnapshot {
            strike,
            snapshot: Snapshot {
                spot,
                time: time.to_string(),
                puts_coi: row.puts_change_oi,
                calls_coi: row.calls_change_oi,
            },
        });
    }

    Aggregation {
        atm,
        records,
        totals: Snapshot {
            spot,
            time: time.to_string(),
            puts_coi: total_puts,
            calls_coi: total_calls,
        },
    }
}

// ─────────────────────────────────────────  Live view ──────

/// One strike of the live display, values in lakhs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStrike {
    pub atm: f64,
    #[serde(rename = "strikePrice")]
    pub strike_price: f64,
    #[serde(rename = "callsOi")]
    pub calls_oi: f64,
    #[serde(rename = "callsCoi")]
    pub calls_coi: f64,
    #[serde(rename = "putsOi")]
    pub puts_oi: f64,
    #[serde(rename = "putsCoi")]
    pub puts_coi: f64,
}

/// ±10 strikes around the inclusive ATM. Stateless, never stored.
pub fn live_view(chain: &SortedChain, spot: f64) -> Vec<LiveStrike> {
    let Some(atm) = chain.locate_atm(spot, AtmRule::AtOrAbove) else {
        return Vec::new();
    };

    chain.rows()[window(atm.index, LIVE_RADIUS, chain.len())]
        .iter()
        .map(|row| LiveStrike {
            atm: atm.strike,
            strike_price: row.strike_price,
            calls_oi: to_lakhs(row.calls_oi),
            calls_coi: to_lakhs(row.calls_change_oi),
            puts_oi: to_lakhs(row.puts_oi),
            puts_coi: to_lakhs(row.puts_change_oi),
        })
        .collect()
}

// ─────────────────────────────────────────  Strike list ──────

/// Strike increment: smallest non-zero gap between row 20 and any later row.
/// Rows nearer ATM are skipped because their spacing is often irregular.
pub fn strike_increment(chain: &SortedChain) -> Option<f64> {
    let rows = chain.rows();
    let pivot = rows.get(INCREMENT_PIVOT)?.strike_price;

    let step = rows[INCREMENT_PIVOT + 1..]
        .iter()
        .map(|row| (pivot - row.strike_price).abs())
        .filter(|gap| *gap > 0.0)
        .fold(f64::INFINITY, f64::min);

    step.is_finite().then_some(step)
}

/// Spot rounded up to the increment, ± 5 increments, ascending.
pub fn strike_list(chain: &SortedChain, spot: f64) -> Option<Vec<i64>> {
    let step = strike_increment(chain)?;
    let atm = (spot / step).ceil() * step;

    let mut strikes: Vec<i64> = (-STRIKE_LIST_SPAN..=STRIKE_LIST_SPAN)
        .map(|k| (atm + k as f64 * step).round() as i64)
        .collect();
    strikes.sort_unstable();
    Some(strikes)
}
