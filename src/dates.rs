//! Calendar dates for expenses and month windows for statistics.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::{Date, Duration, format_description::BorrowedFormatItem, macros::format_description};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A `YYYY-MM-DD` calendar date with a chronological total order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpenseDate(Date);

impl ExpenseDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(self) -> Date {
        self.0
    }

    pub fn today() -> Self {
        Self(time::OffsetDateTime::now_utc().date())
    }
}

impl fmt::Display for ExpenseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for ExpenseDate {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::parse(s.trim(), DATE_FORMAT).map(Self)
    }
}

impl Serialize for ExpenseDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExpenseDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| de::Error::custom(format!("invalid date '{raw}', expected YYYY-MM-DD")))
    }
}

/// Inclusive date bounds; either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<ExpenseDate>,
    pub end: Option<ExpenseDate>,
}

impl DateRange {
    pub fn new(start: Option<ExpenseDate>, end: Option<ExpenseDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: ExpenseDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Calendar-month windows relative to today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    CurrentMonth,
    LastMonth,
}

impl Period {
    /// First and last day of the target month.
    pub fn bounds(self, today: ExpenseDate) -> (ExpenseDate, ExpenseDate) {
        let target = match self {
            Period::CurrentMonth => today.date(),
            Period::LastMonth => first_of_month(today.date())
                .previous_day()
                .unwrap_or(Date::MIN),
        };
        let (start, end) = month_bounds(target);
        (ExpenseDate(start), ExpenseDate(end))
    }

    pub fn range(self, today: ExpenseDate) -> DateRange {
        let (start, end) = self.bounds(today);
        DateRange::new(Some(start), Some(end))
    }
}

fn first_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// First and last day of the calendar month containing `date`.
pub fn month_bounds(date: Date) -> (Date, Date) {
    let start = first_of_month(date);
    let end = start
        .checked_add(Duration::days(31))
        .map(first_of_month)
        .and_then(Date::previous_day)
        .unwrap_or(date);
    (start, end)
}
