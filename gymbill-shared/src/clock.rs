/// Time source for the billing core
///
/// "Today" is a calendar date in the gym's time zone, not in UTC: a job that
/// runs at 00:30 in São Paulo must bill for the local date. Services take a
/// [`Clock`] so tests can pin both the instant and the date.
///
/// # Example
///
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use gymbill_shared::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::at(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap());
/// assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};

/// Source of the current instant and business date
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date in the business time zone
    fn today(&self) -> NaiveDate;
}

/// Wall clock in a fixed business time zone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

/// Settable clock for tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    timezone: Tz,
}

impl FixedClock {
    /// Clock pinned to `now`, interpreting dates in UTC
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            timezone: Tz::UTC,
        }
    }

    /// Clock pinned to noon UTC on `date`
    pub fn on(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Self::at(noon)
    }

    /// Interprets dates in another time zone
    pub fn in_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Moves the clock
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.timezone).date_naive()
    }
}
