use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Serialize, Serializer};

/// Months before the current one that open the monthly chart axis.
pub const MONTH_BUCKET_LOOKBACK: u32 = 12;

/// A calendar quarter, stored as the first day of its first month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter(NaiveDate);

impl Quarter {
    pub fn of(date: NaiveDate) -> Self {
        Quarter(quarter_start(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// 1 through 4.
    pub fn number(&self) -> u32 {
        self.0.month0() / 3 + 1
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year(), self.number())
    }
}

impl Serialize for Quarter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A calendar month, stored as its first day and displayed as `Feb 2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthLabel(NaiveDate);

impl MonthLabel {
    pub fn of(date: NaiveDate) -> Self {
        MonthLabel(month_start(date))
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%b %Y"))
    }
}

impl Serialize for MonthLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    month_start(date) - Months::new(date.month0() % 3)
}

/// 1-based week index within the date's calendar quarter; week 1 covers
/// days 0 through 6.
pub fn week_of_quarter(date: NaiveDate) -> u32 {
    let offset = (date - quarter_start(date)).num_days();
    (offset / 7) as u32 + 1
}

pub fn quarter_of(date: Option<NaiveDate>) -> Option<Quarter> {
    date.map(Quarter::of)
}

pub fn week_of(date: Option<NaiveDate>) -> Option<u32> {
    date.map(week_of_quarter)
}

pub fn month_of(date: Option<NaiveDate>) -> Option<MonthLabel> {
    date.map(MonthLabel::of)
}

/// One slot on the monthly chart axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBucket {
    pub label: MonthLabel,
    pub start: NaiveDate,
}

/// The trailing thirteen months ending with the month containing `today`,
/// oldest first.
pub fn month_buckets(today: NaiveDate) -> Vec<MonthBucket> {
    let first = month_start(today) - Months::new(MONTH_BUCKET_LOOKBACK);
    (0..=MONTH_BUCKET_LOOKBACK)
        .map(|offset| {
            let start = first + Months::new(offset);
            MonthBucket {
                label: MonthLabel::of(start),
                start,
            }
        })
        .collect()
}
