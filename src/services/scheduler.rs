use crate::{
    db::store::SeriesStore,
    services::{
        ingestion::Ingestor,
        timeseries,
        trading_hours::{Clock, TradingCalendar},
    },
};
use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use futures::future::{abortable, AbortHandle};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollingState {
    Stopped,
    Running,
}

/// Owns the repeating ingestion timer. Constructed once per process and
/// shared by `Arc`; `start`/`stop` are idempotent.
pub struct PollingController {
    ingestor: Arc<Ingestor>,
    symbols: Arc<Vec<String>>,
    period: Duration,
    timer: Mutex<Option<AbortHandle>>,
    // held for the whole of a cycle, across timer restarts
    cycle_guard: Arc<tokio::sync::Mutex<()>>,
}

impl PollingController {
    pub fn new(ingestor: Arc<Ingestor>, symbols: Vec<String>, period: Duration) -> Self {
        Self {
            ingestor,
            symbols: Arc::new(symbols),
            period,
            timer: Mutex::new(None),
            cycle_guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn state(&self) -> PollingState {
        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match timer.as_ref() {
            Some(handle) if !handle.is_aborted() => PollingState::Running,
            _ => PollingState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollingState::Running
    }

    /// Starts the timer (first cycle fires immediately). Returns `false` if
    /// it was already running.
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|h| !h.is_aborted()) {
            log::debug!("polling: start ignored, already running");
            return false;
        }

        let (task, abort) = abortable(run_timer(
            Arc::clone(&self.ingestor),
            Arc::clone(&self.symbols),
            self.period,
            Arc::clone(&self.cycle_guard),
        ));
        tokio::spawn(task);
        *timer = Some(abort);

        log::info!(
            "polling: started every {:?} for {}",
            self.period,
            self.symbols.join(",")
        );
        true
    }

    /// Cancels the timer only; a cycle already in flight runs to completion.
    /// Returns `false` if it was already stopped.
    pub fn stop(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match timer.take() {
            Some(handle) => {
                handle.abort();
                log::info!("polling: stopped");
                true
            }
            None => {
                log::debug!("polling: stop ignored, not running");
                false
            }
        }
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    ingestor: Arc<Ingestor>,
    symbols: Arc<Vec<String>>,
    period: Duration,
    cycle_guard: Arc<tokio::sync::Mutex<()>>,
) {
    let mut iv = interval(period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        iv.tick().await;

        let Ok(held) = Arc::clone(&cycle_guard).try_lock_owned() else {
            log::warn!("polling: previous cycle still running, tick skipped");
            continue;
        };

        let ingestor = Arc::clone(&ingestor);
        let symbols = Arc::clone(&symbols);
        // separate task: aborting the timer must not cancel in-flight writes
        let cycle = tokio::spawn(async move {
            let _held = held;
            let report = ingestor.ingest_all(&symbols).await;
            if !report.is_clean() {
                log::warn!(
                    "polling: cycle finished with {} symbol failure(s)",
                    report.failed.len()
                );
            }
        });
        if let Err(e) = cycle.await {
            log::error!("polling: cycle task: {e}");
        }
    }
}

// ─────────────────────────────────────────  Session triggers ──────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    ResetStore,
    StartPolling,
    StopPolling,
}

/// Dates on which each daily trigger last fired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionMarks {
    pub reset_on: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
    pub stopped_on: Option<NaiveDate>,
}

/// Which daily triggers are due at `now`. Each fires at most once per date.
pub fn due_actions(
    calendar: &TradingCalendar,
    reset_at: NaiveTime,
    now: &DateTime<Tz>,
    running: bool,
    marks: &SessionMarks,
) -> Vec<SessionAction> {
    let today = now.date_naive();
    let t = now.time();
    let mut due = Vec::new();

    if !calendar.is_trading_day(today) {
        if running {
            due.push(SessionAction::StopPolling);
        }
        return due;
    }

    if reset_at <= t && t < calendar.open() && marks.reset_on != Some(today) {
        due.push(SessionAction::ResetStore);
    }

    if calendar.is_within_trading_window(t) && marks.started_on != Some(today) {
        due.push(SessionAction::StartPolling);
    }

    if t >= calendar.close()
        && !calendar.is_within_trading_window(t)
        && running
        && marks.stopped_on != Some(today)
    {
        due.push(SessionAction::StopPolling);
    }

    due
}

/// Calendar-driven reset/start/stop, evaluated on a fixed reconcile period.
pub struct SessionScheduler {
    calendar: Arc<TradingCalendar>,
    reset_at: NaiveTime,
    controller: Arc<PollingController>,
    store: Arc<dyn SeriesStore>,
    clock: Arc<dyn Clock>,
    marks: Mutex<SessionMarks>,
}

impl SessionScheduler {
    pub fn new(
        calendar: Arc<TradingCalendar>,
        reset_at: NaiveTime,
        controller: Arc<PollingController>,
        store: Arc<dyn SeriesStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            calendar,
            reset_at,
            controller,
            store,
            clock,
            marks: Mutex::new(SessionMarks::default()),
        }
    }

    pub fn marks(&self) -> SessionMarks {
        *self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark(&self, f: impl FnOnce(&mut SessionMarks)) {
        f(&mut self.marks.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Evaluates and executes whatever is due; returns what ran.
    pub async fn tick(&self) -> Vec<SessionAction> {
        let now = self.clock.now();
        let today = now.date_naive();
        let due = due_actions(
            &self.calendar,
            self.reset_at,
            &now,
            self.controller.is_running(),
            &self.marks(),
        );

        for action in &due {
            match action {
                SessionAction::ResetStore => {
                    match timeseries::reset(self.store.as_ref(), self.controller.symbols()).await {
                        Ok(n) => {
                            log::info!("session: store reset before open ({n} records)");
                            self.mark(|m| m.reset_on = Some(today));
                        }
                        // left unmarked so the next tick retries
                        Err(e) => log::error!("session: reset failed: {e}"),
                    }
                }
                SessionAction::StartPolling => {
                    self.controller.start();
                    self.mark(|m| m.started_on = Some(today));
                }
                SessionAction::StopPolling => {
                    self.controller.stop();
                    self.mark(|m| m.stopped_on = Some(today));
                }
            }
        }
        due
    }

    /// Reconciles every `every`; abort the handle to shut it down.
    pub fn spawn(self: Arc<Self>, every: Duration) -> AbortHandle {
        let (task, abort) = abortable(async move {
            let mut iv = interval(every);
            loop {
                iv.tick().await;
                self.tick().await;
            }
        });
        tokio::spawn(task);
        abort
    }
}
