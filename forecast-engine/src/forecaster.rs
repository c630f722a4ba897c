//! Calendar forecasts of invoiced cash across a population.
//!
//! A forecast period reports two different figures side by side:
//! `projected_invoice_amount` is the cash that actually lands in the span,
//! `average_mrr_represented` is the steady-state monthly value of just the
//! subscriptions that invoice in it. Quarterly and annual payers make the two
//! diverge.

use crate::error::{EngineError, ValidationError};
use crate::models::{InvoiceEvent, Subscription};
use crate::normalizer::normalize_subscription;
use crate::period::{month_label, month_weeks, DateWindow, QuarterSpan};
use crate::projector::{project_with_limits, ProjectionLimits};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

/// What went wrong while building a period, without failing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub excluded_subscriptions: usize,
    pub errors: Vec<ValidationError>,
    /// Subscriptions whose projection was cut short by an iteration cap.
    pub truncated_projections: usize,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.excluded_subscriptions == 0 && self.truncated_projections == 0
    }

    fn exclude(&mut self, error: ValidationError) {
        self.excluded_subscriptions += 1;
        self.errors.push(error);
    }
}

/// Running period totals with one more subscription's invoices and MRR added.
fn add_totals(
    events: &[InvoiceEvent],
    amount: Decimal,
    mrr_represented: Decimal,
    mrr: Decimal,
) -> Result<(Decimal, Decimal), EngineError> {
    let overflow = || EngineError::AmountOverflow(format!("period total {} with MRR {}", amount, mrr));
    let amount = events
        .iter()
        .try_fold(amount, |total, event| total.checked_add(event.amount))
        .ok_or_else(overflow)?;
    let mrr_represented = mrr_represented.checked_add(mrr).ok_or_else(overflow)?;
    Ok((amount, mrr_represented))
}

/// Forecast for one named span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastPeriod {
    pub label: String,
    pub window: DateWindow,
    /// Sum of invoice amounts landing in the span.
    pub projected_invoice_amount: Decimal,
    /// Distinct customers invoicing in the span.
    pub customer_count: usize,
    /// Normalized MRR of the subscriptions invoicing in the span.
    pub average_mrr_represented: Decimal,
    /// Invoices in date order.
    pub invoices: Vec<InvoiceEvent>,
    pub diagnostics: Diagnostics,
}

/// Invoices collected in one week of the current month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekCollection {
    pub week_number: u32,
    pub date_range: String,
    pub customer_count: usize,
    pub total_amount: Decimal,
    pub customers: Vec<String>,
}

/// The current month split around an as-of date.
///
/// Scheduled invoices dated on or before `as_of` are treated as collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentMonthForecast {
    pub as_of: NaiveDate,
    pub period: ForecastPeriod,
    pub invoiced_to_date: Decimal,
    pub projected_remaining: Decimal,
    /// Only weeks with at least one invoice.
    pub collection_by_week: Vec<WeekCollection>,
}

impl CurrentMonthForecast {
    pub fn total_projected(&self) -> Decimal {
        self.invoiced_to_date + self.projected_remaining
    }
}

/// Runs projections over a population with fixed limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forecaster {
    limits: ProjectionLimits,
}

impl Forecaster {
    pub fn new(limits: ProjectionLimits) -> Self {
        Self { limits }
    }

    /// Forecast an arbitrary window.
    pub fn period(
        &self,
        subscriptions: &[Subscription],
        window: DateWindow,
        label: impl Into<String>,
    ) -> ForecastPeriod {
        let mut diagnostics = Diagnostics::default();
        let mut invoices = Vec::new();
        let mut customers: HashSet<&str> = HashSet::new();
        let mut mrr_represented = Decimal::ZERO;
        let mut projected_invoice_amount = Decimal::ZERO;

        for sub in subscriptions {
            let projection = match project_with_limits(sub, window, self.limits) {
                Ok(projection) => projection,
                Err(e) => {
                    tracing::warn!(
                        customer_id = %sub.customer_id,
                        window = %window,
                        error = %e,
                        "Excluding subscription from forecast"
                    );
                    diagnostics.exclude(e);
                    continue;
                }
            };
            if projection.truncated {
                diagnostics.truncated_projections += 1;
            }
            if projection.events.is_empty() {
                continue;
            }

            let totals = normalize_subscription(sub).and_then(|mrr| {
                add_totals(&projection.events, projected_invoice_amount, mrr_represented, mrr)
                    .map_err(|e| sub.subscription_error(e))
            });
            match totals {
                Ok((amount, mrr)) => {
                    projected_invoice_amount = amount;
                    mrr_represented = mrr;
                }
                Err(e) => {
                    tracing::warn!(
                        customer_id = %sub.customer_id,
                        window = %window,
                        error = %e,
                        "Excluding subscription from forecast"
                    );
                    diagnostics.exclude(e);
                    continue;
                }
            }
            customers.insert(sub.customer_id.as_str());
            invoices.extend(projection.events);
        }

        invoices.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });

        ForecastPeriod {
            label: label.into(),
            window,
            projected_invoice_amount,
            customer_count: customers.len(),
            average_mrr_represented: mrr_represented,
            invoices,
            diagnostics,
        }
    }

    /// Forecast one calendar month.
    pub fn month(
        &self,
        subscriptions: &[Subscription],
        year: i32,
        month: u32,
    ) -> Result<ForecastPeriod, EngineError> {
        let window = DateWindow::month(year, month)?;
        Ok(self.period(subscriptions, window, month_label(window.start)))
    }

    /// `count` rolling three-month spans, the first starting in `as_of`'s month.
    pub fn quarters(
        &self,
        subscriptions: &[Subscription],
        as_of: NaiveDate,
        count: u32,
    ) -> Result<Vec<ForecastPeriod>, EngineError> {
        let first = QuarterSpan::containing(as_of);
        (0..count)
            .map(|offset| {
                let span = first.advance(offset);
                Ok(self.period(subscriptions, span.window()?, span.label()))
            })
            .collect()
    }

    /// Twelve consecutive calendar months starting in `as_of`'s month.
    pub fn year(
        &self,
        subscriptions: &[Subscription],
        as_of: NaiveDate,
    ) -> Result<Vec<ForecastPeriod>, EngineError> {
        let first = DateWindow::month(as_of.year(), as_of.month())?;
        (0..12u32)
            .map(|offset| {
                let start = first
                    .start
                    .checked_add_months(chrono::Months::new(offset))
                    .ok_or_else(|| EngineError::InvalidDate(first.start.to_string()))?;
                self.month(subscriptions, start.year(), start.month())
            })
            .collect()
    }

    /// The month containing `as_of`, split into collected and remaining cash.
    pub fn current_month(
        &self,
        subscriptions: &[Subscription],
        as_of: NaiveDate,
    ) -> Result<CurrentMonthForecast, EngineError> {
        let period = self.month(subscriptions, as_of.year(), as_of.month())?;

        let mut invoiced_to_date = Decimal::ZERO;
        let mut projected_remaining = Decimal::ZERO;
        for invoice in &period.invoices {
            if invoice.date <= as_of {
                invoiced_to_date += invoice.amount;
            } else {
                projected_remaining += invoice.amount;
            }
        }

        let mut collection_by_week = Vec::new();
        for week in month_weeks(as_of.year(), as_of.month())? {
            let mut customers: Vec<String> = Vec::new();
            let mut total_amount = Decimal::ZERO;
            for invoice in period.invoices.iter().filter(|i| week.contains(i.date)) {
                total_amount += invoice.amount;
                if !customers.contains(&invoice.customer_id) {
                    customers.push(invoice.customer_id.clone());
                }
            }
            if customers.is_empty() {
                continue;
            }
            collection_by_week.push(WeekCollection {
                week_number: week.week_number,
                date_range: week.date_range(),
                customer_count: customers.len(),
                total_amount,
                customers,
            });
        }

        Ok(CurrentMonthForecast {
            as_of,
            period,
            invoiced_to_date,
            projected_remaining,
            collection_by_week,
        })
    }
}

/// Forecast one calendar month with default limits.
pub fn forecast_month(
    subscriptions: &[Subscription],
    year: i32,
    month: u32,
) -> Result<ForecastPeriod, EngineError> {
    Forecaster::default().month(subscriptions, year, month)
}

/// Forecast `n` rolling quarters from `as_of` with default limits.
pub fn forecast_quarters(
    subscriptions: &[Subscription],
    as_of: NaiveDate,
    n: u32,
) -> Result<Vec<ForecastPeriod>, EngineError> {
    Forecaster::default().quarters(subscriptions, as_of, n)
}

/// Forecast twelve months from `as_of` with default limits.
pub fn forecast_year(
    subscriptions: &[Subscription],
    as_of: NaiveDate,
) -> Result<Vec<ForecastPeriod>, EngineError> {
    Forecaster::default().year(subscriptions, as_of)
}

/// Forecast the month containing `as_of` with default limits.
pub fn forecast_current_month(
    subscriptions: &[Subscription],
    as_of: NaiveDate,
) -> Result<CurrentMonthForecast, EngineError> {
    Forecaster::default().current_month(subscriptions, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::models::LineItem;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(customer_id: &str, anchor: NaiveDate, amount: Decimal, interval: Interval, count: u32) -> Subscription {
        Subscription::new(customer_id, anchor, vec![LineItem::new(amount, interval, count)])
    }

    #[test]
    fn test_month_sums_invoices_and_mrr_separately() {
        let subs = vec![
            sub("cus_monthly", date(2025, 1, 3), dec!(100), Interval::Month, 1),
            sub("cus_annual", date(2025, 11, 20), dec!(1200), Interval::Year, 1),
            sub("cus_quarterly", date(2025, 9, 1), dec!(300), Interval::Month, 3),
        ];
        let november = forecast_month(&subs, 2025, 11).unwrap();

        assert_eq!(november.label, "November 2025");
        assert_eq!(november.customer_count, 2);
        assert_eq!(november.projected_invoice_amount, dec!(1300));
        assert_eq!(november.average_mrr_represented, dec!(200));
        assert!(november.diagnostics.is_clean());
    }

    #[test]
    fn test_overflowing_invoice_total_excluded() {
        let subs = vec![
            sub("cus_monthly", date(2025, 1, 3), dec!(100), Interval::Month, 1),
            sub("cus_huge", date(2025, 1, 5), Decimal::MAX - dec!(100), Interval::Year, 1),
            sub("cus_huge_2", date(2025, 1, 9), Decimal::MAX, Interval::Year, 1),
        ];
        let january = forecast_month(&subs, 2025, 1).unwrap();

        assert_eq!(january.diagnostics.excluded_subscriptions, 1);
        assert_eq!(january.diagnostics.errors[0].customer_id, "cus_huge_2");
        assert!(matches!(
            january.diagnostics.errors[0].reason,
            EngineError::AmountOverflow(_)
        ));
        assert_eq!(january.customer_count, 2);
        assert_eq!(january.invoices.len(), 2);
        assert!(january.invoices.iter().all(|i| i.customer_id != "cus_huge_2"));
    }

    #[test]
    fn test_invalid_month() {
        assert_eq!(
            forecast_month(&[], 2025, 13).unwrap_err(),
            EngineError::InvalidMonth(13)
        );
    }

    #[test]
    fn test_bad_subscription_excluded_not_fatal() {
        let subs = vec![
            sub("cus_ok", date(2025, 11, 2), dec!(100), Interval::Month, 1),
            sub("cus_bad", date(2025, 11, 2), dec!(100), Interval::Month, 0),
        ];
        let november = forecast_month(&subs, 2025, 11).unwrap();

        assert_eq!(november.projected_invoice_amount, dec!(100));
        assert_eq!(november.diagnostics.excluded_subscriptions, 1);
        assert_eq!(november.diagnostics.errors[0].customer_id, "cus_bad");
    }

    #[test]
    fn test_quarters_start_at_as_of_month() {
        let subs = vec![sub("cus_1", date(2025, 12, 10), dec!(90), Interval::Month, 1)];
        let quarters = forecast_quarters(&subs, date(2025, 12, 5), 2).unwrap();

        assert_eq!(quarters.len(), 2);
        assert_eq!(quarters[0].label, "Q4 2025");
        assert_eq!(quarters[0].window.start, date(2025, 12, 1));
        assert_eq!(quarters[0].window.end, date(2026, 3, 1));
        assert_eq!(quarters[0].projected_invoice_amount, dec!(270));
        assert_eq!(quarters[0].customer_count, 1);
        // MRR counted once per subscription, not once per invoice
        assert_eq!(quarters[0].average_mrr_represented, dec!(90));
        assert_eq!(quarters[1].label, "Q1 2026");
    }

    #[test]
    fn test_year_is_twelve_calendar_months() {
        let subs = vec![sub("cus_1", date(2025, 2, 28), dec!(1200), Interval::Year, 1)];
        let months = forecast_year(&subs, date(2025, 10, 31)).unwrap();

        assert_eq!(months.len(), 12);
        assert_eq!(months[0].label, "October 2025");
        assert_eq!(months[11].label, "September 2026");
        let invoicing: Vec<&str> = months
            .iter()
            .filter(|m| m.customer_count > 0)
            .map(|m| m.label.as_str())
            .collect();
        assert_eq!(invoicing, vec!["February 2026"]);
    }

    #[test]
    fn test_current_month_split() {
        let subs = vec![
            sub("cus_early", date(2025, 10, 3), dec!(100), Interval::Month, 1),
            sub("cus_today", date(2025, 10, 15), dec!(50), Interval::Month, 1),
            sub("cus_late", date(2025, 10, 30), dec!(25), Interval::Month, 1),
        ];
        let current = forecast_current_month(&subs, date(2025, 11, 15)).unwrap();

        assert_eq!(current.invoiced_to_date, dec!(150));
        assert_eq!(current.projected_remaining, dec!(25));
        assert_eq!(current.total_projected(), dec!(175));

        let weeks: Vec<u32> = current
            .collection_by_week
            .iter()
            .map(|w| w.week_number)
            .collect();
        assert_eq!(weeks, vec![1, 3, 5]);
        assert_eq!(current.collection_by_week[2].date_range, "11/29-30");
        assert_eq!(current.collection_by_week[2].customers, vec!["cus_late".to_string()]);
    }
}
