use chrono::{NaiveDate, NaiveTime};
use dotenv::dotenv;
use std::{env, str::FromStr, time::Duration};

use crate::utils::errors::ConfigError;

pub const DEFAULT_UPSTREAM_URL: &str =
    "https://webapi.niftytrader.in/webapi/option/fatch-option-chain";
pub const DEFAULT_SYMBOLS: &str = "NIFTY,BANKNIFTY,FINNIFTY";
pub const DEFAULT_HOLIDAYS: &str = "02-10-2023,14-11-2023,27-11-2023,25-12-2023";
pub const HOLIDAY_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub symbols: Vec<String>,
    pub poll_interval: Duration,
    pub ingest_concurrency: usize,
    pub holidays: Vec<NaiveDate>,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    pub reset_at: NaiveTime,
    pub legacy_minute_gate: bool,
    pub weekdays_only: bool,
    pub auto_schedule: bool,
    pub admin_token: Option<String>,
    pub metrics_port: Option<u16>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok(); // loads `.env` file automatically
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup; `new()` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server_port = parse_or(get("PORT"), "PORT", 8000u16)?;
        let upstream_url = get("UPSTREAM_API_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.into());
        let upstream_timeout =
            Duration::from_secs(parse_or(get("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS", 10u64)?);

        let store_backend = match get("STORE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("redis") => StoreBackend::Redis,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    reason: format!("unknown backend '{other}'"),
                })
            }
        };
        let redis_url = get("REDIS_URL");
        if store_backend == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        let symbols: Vec<String> = get("TRACKED_SYMBOLS")
            .unwrap_or_else(|| DEFAULT_SYMBOLS.into())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(ConfigError::Invalid {
                key: "TRACKED_SYMBOLS",
                reason: "at least one symbol is required".into(),
            });
        }

        let poll_secs = parse_or(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", 60u64)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }
        let ingest_concurrency =
            parse_or(get("INGEST_CONCURRENCY"), "INGEST_CONCURRENCY", 3usize)?.max(1);

        let holidays = parse_holidays(&get("TRADING_HOLIDAYS").unwrap_or_else(|| DEFAULT_HOLIDAYS.into()))?;

        let session_open = parse_time(get("SESSION_OPEN"), "SESSION_OPEN", (9, 20))?;
        let session_close = parse_time(get("SESSION_CLOSE"), "SESSION_CLOSE", (15, 30))?;
        let reset_at = parse_time(get("RESET_AT"), "RESET_AT", (9, 0))?;
        if session_open >= session_close {
            return Err(ConfigError::Invalid {
                key: "SESSION_OPEN",
                reason: "session must open before it closes".into(),
            });
        }

        Ok(Self {
            server_port,
            upstream_url,
            upstream_timeout,
            store_backend,
            redis_url,
            symbols,
            poll_interval: Duration::from_secs(poll_secs),
            ingest_concurrency,
            holidays,
            session_open,
            session_close,
            reset_at,
            legacy_minute_gate: parse_or(get("LEGACY_MINUTE_GATE"), "LEGACY_MINUTE_GATE", false)?,
            weekdays_only: parse_or(get("WEEKDAYS_ONLY"), "WEEKDAYS_ONLY", true)?,
            auto_schedule: parse_or(get("AUTO_SCHEDULE"), "AUTO_SCHEDULE", true)?,
            admin_token: get("ADMIN_TOKEN"),
            metrics_port: get("METRICS_PORT")
                .map(|v| parse_value(&v, "METRICS_PORT"))
                .transpose()?,
        })
    }
}

fn parse_value<T>(raw: &str, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

fn parse_time(raw: Option<String>, key: &'static str, default: (u32, u32)) -> Result<NaiveTime, ConfigError> {
    match raw {
        Some(v) => NaiveTime::parse_from_str(&v, "%H:%M").map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("expected HH:MM ({e})"),
        }),
        None => NaiveTime::from_hms_opt(default.0, default.1, 0).ok_or(ConfigError::Invalid {
            key,
            reason: "default out of range".into(),
        }),
    }
}

/// Comma separated `dd-MM-yyyy` list.
pub fn parse_holidays(raw: &str) -> Result<Vec<NaiveDate>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, HOLIDAY_FORMAT).map_err(|e| ConfigError::Invalid {
                key: "TRADING_HOLIDAYS",
                reason: format!("'{s}': {e}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_cover_nse_session() {
        let s = settings(&[("REDIS_URL", "redis://127.0.0.1:6379")]).unwrap();
        assert_eq!(s.server_port, 8000);
        assert_eq!(s.symbols, vec!["NIFTY", "BANKNIFTY", "FINNIFTY"]);
        assert_eq!(s.holidays.len(), 4);
        assert_eq!(s.session_open, NaiveTime::from_hms_opt(9, 20, 0).unwrap());
        assert_eq!(s.session_close, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert_eq!(s.upstream_timeout, Duration::from_secs(10));
        assert!(!s.legacy_minute_gate);
        assert!(s.weekdays_only);
    }

    #[test]
    fn redis_backend_requires_url() {
        let e = settings(&[]).unwrap_err();
        assert!(matches!(e, ConfigError::Missing("REDIS_URL")));
    }

    #[test]
    fn memory_backend_needs_no_redis() {
        let s = settings(&[("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(s.store_backend, StoreBackend::Memory);
        assert!(s.redis_url.is_none());
    }

    #[test]
    fn bad_port_is_rejected() {
        let e = settings(&[("STORE_BACKEND", "memory"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(e, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn symbols_are_trimmed_and_uppercased() {
        let s = settings(&[("STORE_BACKEND", "memory"), ("TRACKED_SYMBOLS", " nifty , ,midcpnifty")]).unwrap();
        assert_eq!(s.symbols, vec!["NIFTY", "MIDCPNIFTY"]);
    }

    #[test]
    fn holiday_list_parses_day_first() {
        let days = parse_holidays("26-01-2024, 15-08-2024").unwrap();
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 1, 26).unwrap());
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 8, 15).unwrap());
        assert!(parse_holidays("2024-01-26").is_err());
    }

    #[test]
    fn inverted_session_is_rejected() {
        let e = settings(&[
            ("STORE_BACKEND", "memory"),
            ("SESSION_OPEN", "15:30"),
            ("SESSION_CLOSE", "09:20"),
        ])
        .unwrap_err();
        assert!(matches!(e, ConfigError::Invalid { key: "SESSION_OPEN", .. }));
    }
}
