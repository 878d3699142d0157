//! Timestamps, calendar arithmetic, and the clock abstraction.
//!
//! Timestamps are Unix epoch seconds (UTC). Loan due dates use calendar months,
//! not fixed 30-day blocks: Jan 31 + 1 month is the last day of February.

use crate::error::TypeError;
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time. Clamps to the epoch if the clock is set before 1970.
    pub fn now() -> Self {
        Self(u64::try_from(Utc::now().timestamp()).unwrap_or(0))
    }

    /// Midnight UTC on the given calendar date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
        let secs = Utc.from_utc_datetime(&naive).timestamp();
        u64::try_from(secs).ok().map(Self)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    fn to_datetime(self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.0).ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }

    /// Add whole calendar months, clamping the day to the end of the target month.
    pub fn add_calendar_months(self, months: u32) -> Result<Self, TypeError> {
        let shifted = self
            .to_datetime()
            .and_then(|dt| dt.checked_add_months(Months::new(months)))
            .ok_or(TypeError::DateOutOfRange)?;
        u64::try_from(shifted.timestamp())
            .map(Self)
            .map_err(|_| TypeError::DateOutOfRange)
    }

    /// `(year, month, day)` of this instant in UTC.
    pub fn ymd(self) -> Option<(i32, u32, u32)> {
        self.to_datetime().map(|dt| (dt.year(), dt.month(), dt.day()))
    }

    /// RFC 3339 rendering, used in audit payloads.
    pub fn to_rfc3339(self) -> String {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Source of the current time.
///
/// Production code uses [`SystemClock`]; tests swap in a controllable clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_end_clamps_in_non_leap_year() {
        let disbursed = Timestamp::from_ymd(2025, 1, 31).unwrap();
        let due = disbursed.add_calendar_months(1).unwrap();
        assert_eq!(due.ymd(), Some((2025, 2, 28)));
    }

    #[test]
    fn month_end_clamps_in_leap_year() {
        let disbursed = Timestamp::from_ymd(2024, 1, 31).unwrap();
        let due = disbursed.add_calendar_months(1).unwrap();
        assert_eq!(due.ymd(), Some((2024, 2, 29)));
    }

    #[test]
    fn twelve_months_rolls_the_year() {
        let disbursed = Timestamp::from_ymd(2025, 3, 15).unwrap();
        let due = disbursed.add_calendar_months(12).unwrap();
        assert_eq!(due.ymd(), Some((2026, 3, 15)));
    }

    #[test]
    fn time_of_day_is_preserved() {
        let disbursed = Timestamp::new(Timestamp::from_ymd(2025, 5, 10).unwrap().as_secs() + 3_661);
        let due = disbursed.add_calendar_months(2).unwrap();
        assert_eq!(
            due.as_secs() - Timestamp::from_ymd(2025, 7, 10).unwrap().as_secs(),
            3_661
        );
    }

    #[test]
    fn rfc3339_rendering() {
        let ts = Timestamp::from_ymd(2025, 1, 31).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-31T00:00:00+00:00");
    }
}
