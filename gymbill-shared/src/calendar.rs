/// Calendar arithmetic for billing cycles
///
/// All month arithmetic in the billing core goes through this module. Adding
/// months never overflows into the following month: when the original
/// day-of-month does not exist in the target month, the result is clamped to
/// that month's last day.
///
/// ```text
/// 2023-01-31 + 1 month  -> 2023-02-28
/// 2024-01-31 + 1 month  -> 2024-02-29   (leap year)
/// 2024-03-31 + 1 month  -> 2024-04-30
/// ```
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use gymbill_shared::calendar::{add_months, next_due_date, DueDateRoll, PeriodReference};
///
/// let jan31 = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
/// assert_eq!(add_months(jan31, 1), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
///
/// let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
/// let due = next_due_date(5, today, DueDateRoll::Monthly).unwrap();
/// assert_eq!(PeriodReference::from_date(due).as_str(), "02/2024");
/// ```

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a due date rolls forward once this period's billing day has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDateRoll {
    /// Roll to the same billing day next month
    Monthly,

    /// Roll to the same billing day, same month, next year
    Yearly,
}

/// Returns the last valid day of the given month, or None for an invalid month
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
}

/// Builds a date in the given month, clamping `day` into the month's valid range
///
/// `clamped_date(2024, 2, 31)` is 2024-02-29.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

/// Adds `months` to `date`, clamping to the last day of the resulting month
///
/// Saturates at `NaiveDate::MAX` for results outside chrono's range.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Adds whole days to `date` (saturating)
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Computes the next due date for a billing day relative to a reference date
///
/// The billing day is first placed in the reference month (clamped to the
/// month's length). If that date is already behind the reference date, it
/// rolls to the next month, or to the next year for yearly plans, and the
/// billing day is clamped again into the target month.
///
/// Returns None when `billing_day` is outside 1..=31.
pub fn next_due_date(billing_day: u32, reference: NaiveDate, roll: DueDateRoll) -> Option<NaiveDate> {
    if !(1..=31).contains(&billing_day) {
        return None;
    }

    let candidate = clamped_date(reference.year(), reference.month(), billing_day)?;
    if candidate >= reference {
        return Some(candidate);
    }

    let (year, month) = match roll {
        DueDateRoll::Monthly if reference.month() == 12 => (reference.year() + 1, 1),
        DueDateRoll::Monthly => (reference.year(), reference.month() + 1),
        DueDateRoll::Yearly => (reference.year() + 1, reference.month()),
    };

    clamped_date(year, month, billing_day)
}

/// Returns true when `date`'s month/year is strictly before `other`'s month/year
pub fn month_precedes(date: NaiveDate, other: NaiveDate) -> bool {
    (date.year(), date.month()) < (other.year(), other.month())
}

/// Tag identifying the billing period an invoice belongs to ("MM/YYYY")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PeriodReference(String);

impl PeriodReference {
    /// Derives the period tag from a due date
    pub fn from_date(date: NaiveDate) -> Self {
        PeriodReference(format!("{:02}/{:04}", date.month(), date.year()))
    }

    /// Parses an "MM/YYYY" tag
    pub fn parse(value: &str) -> Option<Self> {
        let (month, year) = value.split_once('/')?;
        if month.len() != 2 || year.len() != 4 {
            return None;
        }
        let month: u32 = month.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    /// Returns the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
