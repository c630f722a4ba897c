//! Billing interval arithmetic.
//!
//! Every question of the form "what does `interval × interval_count` mean" is
//! answered here, on [`BillingCycle`]. A cycle is only obtainable through
//! [`BillingCycle::new`] (or `LineItem::validate`), so the normalizer's
//! [`BillingCycle::monthly_equivalent`] and the projector's
//! [`BillingCycle::step`] always read the same validated pair.
//!
//! There is no "months per cycle" decimal. Month and year cycles advance on
//! the calendar, and day/week amounts are multiplied by a per-month constant
//! instead of divided by a rounded fraction.

use crate::error::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Average number of days in a month.
pub const DAYS_PER_MONTH: Decimal = dec!(30.44);

/// Average number of weeks in a month.
pub const WEEKS_PER_MONTH: Decimal = dec!(4.345);

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Billing interval unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Year => "year",
        }
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            "year" => Ok(Interval::Year),
            other => Err(EngineError::UnknownInterval(other.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar advance between two consecutive invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    /// Fixed day count (day and week intervals).
    Days(u64),
    /// Calendar months (month and year intervals).
    Months(u32),
}

impl CycleStep {
    /// Shortest possible length of one step in days.
    pub fn min_days(&self) -> u64 {
        match self {
            CycleStep::Days(days) => *days,
            // February in a common year
            CycleStep::Months(months) => u64::from(*months) * 28,
        }
    }
}

/// A validated `interval × interval_count` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingCycle {
    interval: Interval,
    count: u32,
}

impl BillingCycle {
    pub fn new(interval: Interval, interval_count: u32) -> Result<Self, EngineError> {
        if interval_count < 1 {
            return Err(EngineError::InvalidIntervalCount(i64::from(interval_count)));
        }
        Ok(Self {
            interval,
            count: interval_count,
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Monthly-equivalent value of `amount` billed once per cycle.
    ///
    /// Fails with [`EngineError::AmountOverflow`] when the result does not fit
    /// in a `Decimal`.
    pub fn monthly_equivalent(&self, amount: Decimal) -> Result<Decimal, EngineError> {
        // Multiply before dividing so day/week rates stay exact.
        let count = Decimal::from(self.count);
        let per_month = match self.interval {
            Interval::Day => amount
                .checked_mul(DAYS_PER_MONTH)
                .and_then(|v| v.checked_div(count)),
            Interval::Week => amount
                .checked_mul(WEEKS_PER_MONTH)
                .and_then(|v| v.checked_div(count)),
            Interval::Month => amount.checked_div(count),
            Interval::Year => amount
                .checked_div(MONTHS_PER_YEAR)
                .and_then(|v| v.checked_div(count)),
        };
        per_month.ok_or_else(|| {
            EngineError::AmountOverflow(format!("{} billed {}", amount, self.describe()))
        })
    }

    /// Calendar step between invoices.
    pub fn step(&self) -> CycleStep {
        match self.interval {
            Interval::Day => CycleStep::Days(u64::from(self.count)),
            Interval::Week => CycleStep::Days(u64::from(self.count) * 7),
            Interval::Month => CycleStep::Months(self.count),
            Interval::Year => CycleStep::Months(self.count.saturating_mul(12)),
        }
    }

    /// Human-readable cadence, e.g. "every 3 months".
    pub fn describe(&self) -> String {
        if self.count == 1 {
            format!("every {}", self.interval)
        } else {
            format!("every {} {}s", self.count, self.interval)
        }
    }
}
