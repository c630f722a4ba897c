//! Calendar spans used by the projector and forecaster.

use crate::error::EngineError;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end <= start {
            return Err(EngineError::EmptyWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// A single calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self, EngineError> {
        Self::months(year, month, 1)
    }

    /// `count` consecutive calendar months starting at `year`/`month`.
    pub fn months(year: i32, month: u32, count: u32) -> Result<Self, EngineError> {
        let start = first_of_month(year, month)?;
        let end = start
            .checked_add_months(Months::new(count))
            .ok_or_else(|| EngineError::InvalidDate(format!("{}-{:02} + {} months", year, month, count)))?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Number of days covered.
    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days().unsigned_abs()
    }

    /// Last day inside the window.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// First day of `year`/`month`, rejecting months outside 1..=12.
pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, EngineError> {
    if !(1..=12).contains(&month) {
        return Err(EngineError::InvalidMonth(month));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::InvalidDate(format!("{}-{:02}-01", year, month)))
}

/// Human-readable month name, e.g. "November 2025".
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_abbreviation(month: u32) -> &'static str {
    MONTH_ABBREVIATIONS[(month as usize + 11) % 12]
}

/// A rolling three-month span that may cross a year boundary.
///
/// Fields stay private so `start_month` is always 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QuarterSpan {
    start_year: i32,
    start_month: u32,
}

impl QuarterSpan {
    pub fn starting(year: i32, month: u32) -> Result<Self, EngineError> {
        first_of_month(year, month)?;
        Ok(Self {
            start_year: year,
            start_month: month,
        })
    }

    /// Span starting in the month of `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            start_year: date.year(),
            start_month: date.month(),
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn start_month(&self) -> u32 {
        self.start_month
    }

    pub fn end_month(&self) -> u32 {
        ((self.start_month - 1 + 2) % 12) + 1
    }

    pub fn end_year(&self) -> i32 {
        if self.end_month() < self.start_month {
            self.start_year + 1
        } else {
            self.start_year
        }
    }

    /// Calendar quarter (1-4) of the starting month.
    pub fn quarter_number(&self) -> u32 {
        (self.start_month - 1) / 3 + 1
    }

    /// "Q4 2025".
    pub fn label(&self) -> String {
        format!("Q{} {}", self.quarter_number(), self.start_year)
    }

    /// "Dec-Feb".
    pub fn months_label(&self) -> String {
        format!(
            "{}-{}",
            month_abbreviation(self.start_month),
            month_abbreviation(self.end_month())
        )
    }

    pub fn window(&self) -> Result<DateWindow, EngineError> {
        DateWindow::months(self.start_year, self.start_month, 3)
    }

    /// The span `n` quarters later.
    pub fn advance(&self, quarters: u32) -> Self {
        let zero_based = self.start_month - 1 + quarters * 3;
        Self {
            start_year: self.start_year + (zero_based / 12) as i32,
            start_month: zero_based % 12 + 1,
        }
    }
}

/// A week-sized slice of a calendar month (inclusive day range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub week_number: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl WeekBucket {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }

    /// "11/1-7".
    pub fn date_range(&self) -> String {
        format!(
            "{}/{}-{}",
            self.first_day.month(),
            self.first_day.day(),
            self.last_day.day()
        )
    }
}

/// Split a month into weeks of days 1-7, 8-14, 15-21, 22-28 and 29-end.
pub fn month_weeks(year: i32, month: u32) -> Result<Vec<WeekBucket>, EngineError> {
    let window = DateWindow::month(year, month)?;
    let days_in_month = window.last_day().day();

    let mut weeks = Vec::with_capacity(5);
    for week_number in 1..=5u32 {
        let first = (week_number - 1) * 7 + 1;
        if first > days_in_month {
            break;
        }
        let last = (week_number * 7).min(days_in_month);
        weeks.push(WeekBucket {
            week_number,
            first_day: window.start.with_day(first).unwrap_or(window.start),
            last_day: window.start.with_day(last).unwrap_or(window.start),
        });
    }
    Ok(weeks)
}
