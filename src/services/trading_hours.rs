use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::{Asia::Kolkata, Tz};
use std::collections::BTreeSet;

use crate::config::settings::Settings;

/// The single trading timezone of the whole system.
pub const MARKET_TZ: Tz = Kolkata;

/// Source of "now" in the market timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketClock;

impl Clock for MarketClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&MARKET_TZ)
    }
}

/// Always returns the same instant. Handy for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Tz>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.0
    }
}

/// `HH:MM`, the time representation stored in every snapshot.
pub fn format_hhmm(t: &DateTime<Tz>) -> String {
    t.format("%H:%M").to_string()
}

/// How the minute component of the trading window is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinuteGate {
    /// `open <= HH:MM <= close`
    Band,
    /// Hour bounds plus an unconditional `minute >= open.minute`, so e.g.
    /// 10:05 is rejected. Kept only for parity with the old deployment.
    Legacy,
}

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
    open: NaiveTime,
    close: NaiveTime,
    weekdays_only: bool,
    gate: MinuteGate,
}

impl TradingCalendar {
    pub fn new(
        holidays: impl IntoIterator<Item = NaiveDate>,
        open: NaiveTime,
        close: NaiveTime,
        weekdays_only: bool,
        gate: MinuteGate,
    ) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
            open,
            close,
            weekdays_only,
            gate,
        }
    }

    pub fn from_settings(s: &Settings) -> Self {
        let gate = if s.legacy_minute_gate {
            MinuteGate::Legacy
        } else {
            MinuteGate::Band
        };
        Self::new(
            s.holidays.iter().copied(),
            s.session_open,
            s.session_close,
            s.weekdays_only,
            gate,
        )
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if self.weekdays_only && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.holidays.contains(&date)
    }

    /// Minute resolution; seconds are ignored so the closing minute is inclusive.
    pub fn is_within_trading_window(&self, time: NaiveTime) -> bool {
        let (h, m) = (time.hour(), time.minute());
        let (oh, om) = (self.open.hour(), self.open.minute());
        let (ch, cm) = (self.close.hour(), self.close.minute());

        match self.gate {
            MinuteGate::Band => (oh, om) <= (h, m) && (h, m) <= (ch, cm),
            MinuteGate::Legacy => h >= oh && m >= om && (h < ch || (h == ch && m <= cm)),
        }
    }

    /// Trading day and inside the window.
    pub fn is_market_open(&self, now: &DateTime<Tz>) -> bool {
        self.is_trading_day(now.date_naive()) && self.is_within_trading_window(now.time())
    }
}
