//! Time sources for lifecycle evaluation.
//!
//! Guards and sweeps compare calendar days, so the clock exposes both a
//! wall-clock timestamp (for `updated_at`/`paused_at`) and a date-truncated
//! "today".

use chrono::{Local, NaiveDate, NaiveTime};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over time so lifecycle rules stay deterministic under test.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> i64;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Production clock backed by the system time and local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one date and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    today: NaiveDate,
    now_ms: i64,
}

impl FixedClock {
    pub fn new(today: NaiveDate, now_ms: i64) -> Self {
        Self { today, now_ms }
    }

    /// Pins `today`; the timestamp is midnight UTC of that date.
    pub fn at_date(today: NaiveDate) -> Self {
        let now_ms = today.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        Self { today, now_ms }
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
