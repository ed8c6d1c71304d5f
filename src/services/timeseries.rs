// src/services/timeseries.rs

use crate::db::models::{SeriesKey, Snapshot};
use crate::db::store::SeriesStore;
use crate::services::chain::Aggregation;
use crate::utils::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Appended,
}

/// Read-then-write: create a one-element series or append to the existing one.
///
/// Not atomic on its own. Safe because a symbol's writes are issued one at a
/// time by a single in-flight cycle.
pub async fn upsert_append(
    store: &dyn SeriesStore,
    key: &SeriesKey,
    snapshot: &Snapshot,
) -> Result<Upsert, StoreError> {
    match store.find(key).await? {
        None => {
            store.create(key, snapshot).await?;
            Ok(Upsert::Created)
        }
        Some(_) => {
            store.append(key, snapshot).await?;
            Ok(Upsert::Appended)
        }
    }
}

#[derive(Debug, Default)]
pub struct PersistReport {
    pub created: usize,
    pub appended: usize,
    pub failed: Vec<(i64, StoreError)>,
}

impl PersistReport {
    pub fn written(&self) -> usize {
        self.created + self.appended
    }
}

/// Writes every entry of `agg` sequentially, totals last. A failed strike is
/// logged and skipped; the rest of the cycle continues.
pub async fn persist(store: &dyn SeriesStore, symbol: &str, agg: &Aggregation) -> PersistReport {
    let mut report = PersistReport::default();

    for (strike, snapshot) in agg.entries() {
        let key = SeriesKey::new(symbol, strike);
        match upsert_append(store, &key, snapshot).await {
            Ok(Upsert::Created) => report.created += 1,
            Ok(Upsert::Appended) => report.appended += 1,
            Err(e) => {
                log::error!("timeseries: write {key} failed: {e}");
                report.failed.push((strike, e));
            }
        }
    }

    report
}

/// Wipes every record of each symbol. Idempotent; an empty store is fine.
pub async fn reset(store: &dyn SeriesStore, symbols: &[String]) -> Result<usize, StoreError> {
    let mut removed = 0;
    for symbol in symbols {
        let n = store.drop_symbol(symbol).await?;
        log::info!("timeseries: reset {symbol} ({n} records)");
        removed += n;
    }
    Ok(removed)
}
