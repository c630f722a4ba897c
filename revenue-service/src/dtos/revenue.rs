//! Response and query types for the revenue endpoints.
//!
//! Engine figures are exact; rounding to cents happens here and only here.

use chrono::{DateTime, NaiveDate, Utc};
use forecast_engine::{
    BillingCycle, CustomerMrr, CurrentMonthForecast, ForecastPeriod, GroupSummary, InvoiceEvent,
    ItemDetail, QuarterSpan, ValidationError, WeekCollection,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round to cents, halves away from zero.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// "$2,391.00".
pub fn format_money(value: Decimal) -> String {
    let rounded = money(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let mut abs = rounded.abs();
    abs.rescale(2);
    let text = abs.to_string();
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{}", sign, grouped, cents)
}

fn error_messages(errors: &[ValidationError]) -> Vec<String> {
    errors.iter().map(|e| e.to_string()).collect()
}

/// Ingest rejections followed by engine exclusions.
pub fn all_errors(rejected: &[ValidationError], engine: &[ValidationError]) -> Vec<String> {
    let mut errors = error_messages(rejected);
    errors.extend(error_messages(engine));
    errors
}

/// A response whose `generated_at` is set each time it is served, including
/// from cache.
pub trait Timestamped {
    fn stamp(&mut self, at: DateTime<Utc>);
}

macro_rules! timestamped {
    ($($response:ty),+ $(,)?) => {
        $(impl Timestamped for $response {
            fn stamp(&mut self, at: DateTime<Utc>) {
                self.generated_at = at;
            }
        })+
    };
}

timestamped!(
    MonthDetailResponse,
    CurrentMonthResponse,
    QuarterlyForecastResponse,
    AnnualForecastResponse,
    MrrResponse,
    CustomerListResponse,
);

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Optional as-of override, defaulting to today (UTC).
#[derive(Debug, Default, Deserialize)]
pub struct AsOfParams {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthDetailParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuarterlyParams {
    pub quarters: Option<u32>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MrrParams {
    /// "category" or "tier".
    pub group_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerParams {
    pub min_mrr: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub invoice_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoice_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mrr: Decimal,
    pub interval: String,
    pub interval_count: u32,
    /// "$2,391.00 every 3 months".
    pub billing_description: String,
}

impl From<&InvoiceEvent> for InvoiceResponse {
    fn from(event: &InvoiceEvent) -> Self {
        let every = BillingCycle::new(event.interval, event.interval_count)
            .map(|cycle| cycle.describe())
            .unwrap_or_else(|_| {
                format!("every {} {}s", event.interval_count, event.interval.as_str())
            });
        Self {
            customer_id: event.customer_id.clone(),
            subscription_id: event.subscription_id.clone(),
            invoice_date: event.date,
            invoice_amount: money(event.amount),
            mrr: money(event.monthly_equivalent),
            interval: event.interval.as_str().to_string(),
            interval_count: event.interval_count,
            billing_description: format!("{} {}", format_money(event.amount), every),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthDetailResponse {
    pub month: String,
    pub year: i32,
    pub month_number: u32,
    pub customer_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_invoice_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_mrr_represented: Decimal,
    pub invoices: Vec<InvoiceResponse>,
    pub excluded_subscriptions: usize,
    pub errors: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl MonthDetailResponse {
    pub fn new(period: &ForecastPeriod, rejected: &[ValidationError]) -> Self {
        let start = period.window.start;
        Self {
            month: period.label.clone(),
            year: chrono::Datelike::year(&start),
            month_number: chrono::Datelike::month(&start),
            customer_count: period.customer_count,
            total_invoice_amount: money(period.projected_invoice_amount),
            total_mrr_represented: money(period.average_mrr_represented),
            invoices: period.invoices.iter().map(InvoiceResponse::from).collect(),
            excluded_subscriptions: rejected.len() + period.diagnostics.excluded_subscriptions,
            errors: all_errors(rejected, &period.diagnostics.errors),
            generated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Current month
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekCollectionResponse {
    pub week_number: u32,
    pub date_range: String,
    pub customer_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub customers: Vec<String>,
}

impl From<&WeekCollection> for WeekCollectionResponse {
    fn from(week: &WeekCollection) -> Self {
        Self {
            week_number: week.week_number,
            date_range: week.date_range.clone(),
            customer_count: week.customer_count,
            total_amount: money(week.total_amount),
            customers: week.customers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMonthSummary {
    pub customers_invoicing: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoiced_to_date: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub projected_remaining: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_projected: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mrr_represented: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMonthResponse {
    pub month: String,
    pub as_of_date: NaiveDate,
    pub summary: CurrentMonthSummary,
    pub collection_by_week: Vec<WeekCollectionResponse>,
    pub excluded_subscriptions: usize,
    pub truncated_projections: usize,
    pub generated_at: DateTime<Utc>,
}

impl CurrentMonthResponse {
    pub fn new(forecast: &CurrentMonthForecast, rejected: &[ValidationError]) -> Self {
        let period = &forecast.period;
        Self {
            month: period.label.clone(),
            as_of_date: forecast.as_of,
            summary: CurrentMonthSummary {
                customers_invoicing: period.customer_count,
                invoiced_to_date: money(forecast.invoiced_to_date),
                projected_remaining: money(forecast.projected_remaining),
                total_projected: money(forecast.total_projected()),
                mrr_represented: money(period.average_mrr_represented),
            },
            collection_by_week: forecast
                .collection_by_week
                .iter()
                .map(WeekCollectionResponse::from)
                .collect(),
            excluded_subscriptions: rejected.len() + period.diagnostics.excluded_subscriptions,
            truncated_projections: period.diagnostics.truncated_projections,
            generated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quarterly and annual
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarterResponse {
    /// "Q4 2025".
    pub quarter: String,
    pub year: i32,
    pub quarter_number: u32,
    /// "Dec-Feb".
    pub months: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub projected_invoice_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_mrr: Decimal,
    pub customer_count: usize,
}

impl From<&ForecastPeriod> for QuarterResponse {
    fn from(period: &ForecastPeriod) -> Self {
        let span = QuarterSpan::containing(period.window.start);
        Self {
            quarter: period.label.clone(),
            year: span.start_year(),
            quarter_number: span.quarter_number(),
            months: span.months_label(),
            start_date: period.window.start,
            end_date: period.window.last_day(),
            projected_invoice_amount: money(period.projected_invoice_amount),
            average_mrr: money(period.average_mrr_represented),
            customer_count: period.customer_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarterlyForecastResponse {
    pub projection_period: String,
    pub quarters: Vec<QuarterResponse>,
    pub excluded_subscriptions: usize,
    pub truncated_projections: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthProjectionResponse {
    pub month: String,
    pub month_number: u32,
    pub year: i32,
    pub customers_invoicing: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub projected_invoice_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mrr_represented: Decimal,
}

impl From<&ForecastPeriod> for MonthProjectionResponse {
    fn from(period: &ForecastPeriod) -> Self {
        let start = period.window.start;
        Self {
            month: period.label.clone(),
            month_number: chrono::Datelike::month(&start),
            year: chrono::Datelike::year(&start),
            customers_invoicing: period.customer_count,
            projected_invoice_amount: money(period.projected_invoice_amount),
            mrr_represented: money(period.average_mrr_represented),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualForecastResponse {
    pub forecast_period: String,
    pub monthly_projections: Vec<MonthProjectionResponse>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_projected: Decimal,
    pub excluded_subscriptions: usize,
    pub truncated_projections: usize,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// MRR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    pub key: String,
    pub active_subscriptions: usize,
    pub customer_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_mrr: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub arr: Decimal,
}

impl From<&GroupSummary> for GroupResponse {
    fn from(group: &GroupSummary) -> Self {
        Self {
            key: group.key.clone(),
            active_subscriptions: group.active_subscriptions,
            customer_count: group.customer_count,
            total_mrr: money(group.total_mrr),
            arr: money(group.arr),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrrResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_mrr: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub arr: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub arpu: Decimal,
    pub active_subscriptions: usize,
    pub paying_subscriptions: usize,
    pub paying_customers: usize,
    pub excluded_subscriptions: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    pub groups: Vec<GroupResponse>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub price_id: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub interval: String,
    pub interval_count: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub mrr: Decimal,
}

impl From<&ItemDetail> for ItemResponse {
    fn from(item: &ItemDetail) -> Self {
        Self {
            price_id: item.price_id.clone(),
            amount: money(item.amount),
            interval: item.interval.clone(),
            interval_count: item.interval_count,
            mrr: money(item.monthly_equivalent),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerMrrResponse {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub category: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub mrr: Decimal,
    pub billing_anchor: NaiveDate,
    pub items: Vec<ItemResponse>,
}

impl From<&CustomerMrr> for CustomerMrrResponse {
    fn from(customer: &CustomerMrr) -> Self {
        Self {
            customer_id: customer.customer_id.clone(),
            subscription_id: customer.subscription_id.clone(),
            category: customer.category.clone(),
            mrr: money(customer.mrr),
            billing_anchor: customer.billing_anchor,
            items: customer.items.iter().map(ItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerListResponse {
    pub total_customers: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_mrr: Decimal,
    pub customers: Vec<CustomerMrrResponse>,
    pub excluded_subscriptions: usize,
    pub generated_at: DateTime<Utc>,
}
