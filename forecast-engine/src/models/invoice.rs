//! Projected invoice model.

use crate::interval::Interval;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// One concrete future invoice for one line item of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceEvent {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub interval: Interval,
    pub interval_count: u32,
    /// Monthly-equivalent value of the line item that produced this invoice.
    pub monthly_equivalent: Decimal,
}
