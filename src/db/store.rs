//! Series store: one append-only list of [`Snapshot`]s per `(symbol, strike)`.
//!
//! Backends only expose the primitive document operations (find, create,
//! append, index, drop). The read-then-write upsert lives in
//! `services::timeseries` and relies on writes for one symbol being issued
//! sequentially.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;

use crate::db::models::{SeriesKey, Snapshot, StrikeRecord};
use crate::db::redis::RedisPool;
use crate::utils::errors::StoreError;

#[async_trait]
pub trait SeriesStore: Send + Sync {
    async fn find(&self, key: &SeriesKey) -> Result<Option<StrikeRecord>, StoreError>;

    /// New record whose series holds only `first`.
    async fn create(&self, key: &SeriesKey, first: &Snapshot) -> Result<(), StoreError>;

    async fn append(&self, key: &SeriesKey, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Every strike with a record for `symbol`, ascending (totals slot included).
    async fn strikes(&self, symbol: &str) -> Result<Vec<i64>, StoreError>;

    /// Removes every record of `symbol`; returns how many were removed.
    async fn drop_symbol(&self, symbol: &str) -> Result<usize, StoreError>;
}

// ─────────────────────────────────────────  In-memory ──────

/// Process-local backend. Used by tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    series: DashMap<SeriesKey, Vec<Snapshot>>,
    index: DashMap<String, BTreeSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn find(&self, key: &SeriesKey) -> Result<Option<StrikeRecord>, StoreError> {
        Ok(self.series.get(key).map(|entry| StrikeRecord {
            symbol: key.symbol.clone(),
            strike_price: key.strike,
            series: entry.value().clone(),
        }))
    }

    async fn create(&self, key: &SeriesKey, first: &Snapshot) -> Result<(), StoreError> {
        self.series.insert(key.clone(), vec![first.clone()]);
        self.index
            .entry(key.symbol.clone())
            .or_default()
            .insert(key.strike);
        Ok(())
    }

    async fn append(&self, key: &SeriesKey, snapshot: &Snapshot) -> Result<(), StoreError> {
        match self.series.get_mut(key) {
            Some(mut entry) => {
                entry.push(snapshot.clone());
                Ok(())
            }
            None => Err(StoreError::Backend(format!("append to missing record {key}"))),
        }
    }

    async fn strikes(&self, symbol: &str) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .index
            .get(symbol)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn drop_symbol(&self, symbol: &str) -> Result<usize, StoreError> {
        let Some((_, strikes)) = self.index.remove(symbol) else {
            return Ok(0);
        };
        let removed = strikes
            .into_iter()
            .filter(|strike| self.series.remove(&SeriesKey::new(symbol, *strike)).is_some())
            .count();
        Ok(removed)
    }
}

// ─────────────────────────────────────────  Redis ──────

const KEY_PREFIX: &str = "oi";

/// Redis layout:
/// * `oi:{SYMBOL}:{STRIKE}` – list of JSON snapshots
/// * `oi:{SYMBOL}:strikes`  – set of strikes that have a list
#[derive(Clone)]
pub struct RedisSeriesStore {
    redis: RedisPool,
}

impl RedisSeriesStore {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }
}

fn series_key(key: &SeriesKey) -> String {
    format!("{KEY_PREFIX}:{key}")
}

fn index_key(symbol: &str) -> String {
    format!("{KEY_PREFIX}:{symbol}:strikes")
}

/// Every key owned by `symbol`, index last.
fn symbol_keys(symbol: &str, strikes: &[i64]) -> Vec<String> {
    strikes
        .iter()
        .map(|strike| series_key(&SeriesKey::new(symbol, *strike)))
        .chain(std::iter::once(index_key(symbol)))
        .collect()
}

#[async_trait]
impl SeriesStore for RedisSeriesStore {
    async fn find(&self, key: &SeriesKey) -> Result<Option<StrikeRecord>, StoreError> {
        let series: Vec<Snapshot> = self.redis.range_json(series_key(key)).await?;
        if series.is_empty() {
            return Ok(None);
        }
        Ok(Some(StrikeRecord {
            symbol: key.symbol.clone(),
            strike_price: key.strike,
            series,
        }))
    }

    async fn create(&self, key: &SeriesKey, first: &Snapshot) -> Result<(), StoreError> {
        self.redis
            .push_json_indexed(&series_key(key), first, &index_key(&key.symbol), key.strike)
            .await?;
        Ok(())
    }

    async fn append(&self, key: &SeriesKey, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.redis.push_json(series_key(key), snapshot).await?;
        Ok(())
    }

    async fn strikes(&self, symbol: &str) -> Result<Vec<i64>, StoreError> {
        let mut strikes: Vec<i64> = self.redis.set_members(index_key(symbol)).await?;
        strikes.sort_unstable();
        Ok(strikes)
    }

    async fn drop_symbol(&self, symbol: &str) -> Result<usize, StoreError> {
        let strikes = self.strikes(symbol).await?;
        if strikes.is_empty() {
            return Ok(0);
        }
        // DEL also counts the index key
        let removed = self.redis.delete(&symbol_keys(symbol, &strikes)).await?;
        Ok(removed.saturating_sub(1))
    }
}
