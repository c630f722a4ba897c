//! Invoice schedule projection for a single subscription.
//!
//! Invoices fall on `anchor + k * step` for `k >= 0`. Month and year steps are
//! always computed from the anchor rather than from the previous occurrence, so
//! an anchor on the 31st lands on the 30th in April and returns to the 31st in
//! July instead of drifting.

use crate::error::ValidationError;
use crate::interval::CycleStep;
use crate::models::{InvoiceEvent, Subscription};
use crate::period::DateWindow;
use chrono::{Datelike, Days, Months, NaiveDate};

/// Upper bounds on projection work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionLimits {
    /// Maximum occurrences emitted for one line item in one window.
    pub max_events_per_item: usize,
}

impl Default for ProjectionLimits {
    fn default() -> Self {
        Self {
            max_events_per_item: 10_000,
        }
    }
}

/// Invoice events for one subscription in one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Events sorted by date, then by item order.
    pub events: Vec<InvoiceEvent>,
    /// Set when an iteration cap stopped the scan before the window ended.
    pub truncated: bool,
}

/// Project invoice dates in `window` with default limits.
pub fn project(sub: &Subscription, window: DateWindow) -> Result<Projection, ValidationError> {
    project_with_limits(sub, window, ProjectionLimits::default())
}

/// Project invoice dates in `window`.
///
/// A subscription anchored after the window yields no events. Zero-amount
/// items never produce an invoice.
pub fn project_with_limits(
    sub: &Subscription,
    window: DateWindow,
    limits: ProjectionLimits,
) -> Result<Projection, ValidationError> {
    let mut projection = Projection::default();

    for (index, item) in sub.items.iter().enumerate() {
        let cycle = item.validate().map_err(|e| sub.item_error(index, e))?;
        let monthly_equivalent = cycle
            .monthly_equivalent(item.amount)
            .map_err(|e| sub.item_error(index, e))?;

        if item.amount.is_zero() || sub.billing_anchor >= window.end {
            continue;
        }

        let step = cycle.step();
        let cap = iteration_cap(window, step, limits);
        let (dates, truncated) = occurrences(sub.billing_anchor, step, window, cap);

        if truncated {
            tracing::warn!(
                customer_id = %sub.customer_id,
                item_index = index,
                window = %window,
                cap = cap,
                "Projection hit iteration cap, returning partial schedule"
            );
            projection.truncated = true;
        }

        projection
            .events
            .extend(dates.into_iter().map(|date| InvoiceEvent {
                customer_id: sub.customer_id.clone(),
                subscription_id: sub.subscription_id.clone(),
                date,
                amount: item.amount,
                interval: item.interval,
                interval_count: item.interval_count,
                monthly_equivalent,
            }));
    }

    // Stable sort keeps item order for invoices on the same day.
    projection.events.sort_by_key(|event| event.date);
    Ok(projection)
}

/// Scan bound from window length over the shortest possible step, clamped by
/// the configured limit.
fn iteration_cap(window: DateWindow, step: CycleStep, limits: ProjectionLimits) -> usize {
    let min_days = step.min_days().max(1);
    let derived = window.days() / min_days + 2;
    usize::try_from(derived)
        .unwrap_or(usize::MAX)
        .min(limits.max_events_per_item)
}

fn occurrences(
    anchor: NaiveDate,
    step: CycleStep,
    window: DateWindow,
    cap: usize,
) -> (Vec<NaiveDate>, bool) {
    let mut dates = Vec::new();
    let mut k = first_index_at_or_after(anchor, step, window.start);

    loop {
        let Some(date) = nth_occurrence(anchor, step, k) else {
            // Past the representable calendar.
            return (dates, false);
        };
        if date >= window.end {
            return (dates, false);
        }
        if date >= window.start {
            if dates.len() == cap {
                return (dates, true);
            }
            dates.push(date);
        }
        k = match k.checked_add(1) {
            Some(next) => next,
            None => return (dates, false),
        };
    }
}

fn nth_occurrence(anchor: NaiveDate, step: CycleStep, k: u64) -> Option<NaiveDate> {
    match step {
        CycleStep::Days(days) => anchor.checked_add_days(Days::new(days.checked_mul(k)?)),
        CycleStep::Months(months) => {
            let total = u32::try_from(u64::from(months).checked_mul(k)?).ok()?;
            anchor.checked_add_months(Months::new(total))
        }
    }
}

/// Smallest `k` whose occurrence could fall on or after `start`, computed
/// directly so anchors far in the past do not cost a walk through history.
fn first_index_at_or_after(anchor: NaiveDate, step: CycleStep, start: NaiveDate) -> u64 {
    if anchor >= start {
        return 0;
    }
    match step {
        CycleStep::Days(days) => {
            let elapsed = (start - anchor).num_days().unsigned_abs();
            let days = days.max(1);
            elapsed.div_ceil(days)
        }
        CycleStep::Months(months) => {
            let elapsed = (i64::from(start.year()) - i64::from(anchor.year())) * 12
                + i64::from(start.month())
                - i64::from(anchor.month());
            // One step early at most; the scan skips anything before `start`.
            let k = elapsed.max(0).unsigned_abs() / u64::from(months.max(1));
            k.saturating_sub(1)
        }
    }
}
