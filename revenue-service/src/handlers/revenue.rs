//! Revenue endpoints.
//!
//! Every request reloads the subscription snapshot; the response cache is
//! keyed on its fingerprint so results never outlive the data they came from.

use crate::dtos::{
    all_errors, money, AnnualForecastResponse, AsOfParams, CurrentMonthResponse,
    CustomerListResponse, CustomerMrrResponse, CustomerParams, GroupResponse, MonthDetailParams,
    MonthDetailResponse, MonthProjectionResponse, MrrParams, MrrResponse, QuarterResponse,
    QuarterlyForecastResponse, QuarterlyParams, Timestamped,
};
use crate::error::AppError;
use crate::services::metrics::{record_compute_duration, record_excluded, record_truncated};
use crate::services::fingerprint;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use forecast_engine::{aggregate, customer_breakdown, ingest, Diagnostics, GroupBy, Ingested};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Instant;

const DEFAULT_QUARTERS: u32 = 4;

struct Snapshot {
    fingerprint: String,
    ingested: Ingested,
}

async fn load_snapshot(state: &AppState, endpoint: &str) -> Result<Snapshot, AppError> {
    let source = state.source.active_subscriptions().await?;
    let fingerprint = fingerprint(&source);
    let mut ingested = ingest(source.records);
    ingested.rejected.extend(source.malformed);
    record_excluded(endpoint, "ingest", ingested.rejected_count());
    Ok(Snapshot {
        fingerprint,
        ingested,
    })
}

/// Serve from the response cache, stamping `generated_at` on the way out.
fn cached<T, F>(
    state: &AppState,
    endpoint: &str,
    params: &str,
    snapshot: &Snapshot,
    compute: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned + Timestamped,
    F: FnOnce() -> Result<T, AppError>,
{
    let key = format!("{}?{}#{}", endpoint, params, snapshot.fingerprint);
    let mut response = state.cache.get_or_compute(endpoint, &key, || {
        let start = Instant::now();
        let result = compute();
        record_compute_duration(endpoint, start.elapsed().as_secs_f64());
        result
    })?;
    response.stamp(Utc::now());
    Ok(response)
}

fn record_diagnostics<'a>(endpoint: &str, diagnostics: impl IntoIterator<Item = &'a Diagnostics>) {
    for d in diagnostics {
        record_excluded(endpoint, "engine", d.excluded_subscriptions);
        record_truncated(endpoint, d.truncated_projections);
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// GET /revenue/current-month
pub async fn current_month(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<CurrentMonthResponse>, AppError> {
    const ENDPOINT: &str = "current_month";
    let as_of = params.as_of.unwrap_or_else(today);
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let response = cached(&state, ENDPOINT, &format!("as_of={}", as_of), &snapshot, || {
        let forecast = state
            .forecaster
            .current_month(&snapshot.ingested.subscriptions, as_of)?;
        record_diagnostics(ENDPOINT, [&forecast.period.diagnostics]);
        Ok(CurrentMonthResponse::new(&forecast, &snapshot.ingested.rejected))
    })?;

    tracing::info!(
        as_of = %as_of,
        invoiced_to_date = %response.summary.invoiced_to_date,
        projected_remaining = %response.summary.projected_remaining,
        "Current month forecast served"
    );
    Ok(Json(response))
}

/// GET /revenue/month-detail?year=&month=
pub async fn month_detail(
    State(state): State<AppState>,
    Query(params): Query<MonthDetailParams>,
) -> Result<Json<MonthDetailResponse>, AppError> {
    const ENDPOINT: &str = "month_detail";
    let now = today();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let key = format!("year={}&month={}", year, month);
    let response = cached(&state, ENDPOINT, &key, &snapshot, || {
        let period = state
            .forecaster
            .month(&snapshot.ingested.subscriptions, year, month)?;
        record_diagnostics(ENDPOINT, [&period.diagnostics]);
        Ok(MonthDetailResponse::new(&period, &snapshot.ingested.rejected))
    })?;

    tracing::info!(
        month = %response.month,
        invoices = response.invoices.len(),
        total_invoice_amount = %response.total_invoice_amount,
        "Month detail served"
    );
    Ok(Json(response))
}

/// GET /revenue/quarterly-forecast?quarters=N
pub async fn quarterly_forecast(
    State(state): State<AppState>,
    Query(params): Query<QuarterlyParams>,
) -> Result<Json<QuarterlyForecastResponse>, AppError> {
    const ENDPOINT: &str = "quarterly_forecast";
    let quarters = params.quarters.unwrap_or(DEFAULT_QUARTERS);
    let max_quarters = state.config.forecast.max_quarters;
    if !(1..=max_quarters).contains(&quarters) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "quarters must be between 1 and {}, got {}",
            max_quarters,
            quarters
        )));
    }
    let as_of = params.as_of.unwrap_or_else(today);
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let key = format!("quarters={}&as_of={}", quarters, as_of);
    let response = cached(&state, ENDPOINT, &key, &snapshot, || {
        let periods = state
            .forecaster
            .quarters(&snapshot.ingested.subscriptions, as_of, quarters)?;
        record_diagnostics(ENDPOINT, periods.iter().map(|p| &p.diagnostics));
        let engine_excluded = periods
            .iter()
            .map(|p| p.diagnostics.excluded_subscriptions)
            .max()
            .unwrap_or(0);
        Ok(QuarterlyForecastResponse {
            projection_period: format!("{} quarters", quarters),
            quarters: periods.iter().map(QuarterResponse::from).collect(),
            excluded_subscriptions: snapshot.ingested.rejected_count() + engine_excluded,
            truncated_projections: periods
                .iter()
                .map(|p| p.diagnostics.truncated_projections)
                .sum(),
            generated_at: Utc::now(),
        })
    })?;

    tracing::info!(quarters = quarters, as_of = %as_of, "Quarterly forecast served");
    Ok(Json(response))
}

/// GET /revenue/annual-forecast
pub async fn annual_forecast(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<AnnualForecastResponse>, AppError> {
    const ENDPOINT: &str = "annual_forecast";
    let as_of = params.as_of.unwrap_or_else(today);
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let response = cached(&state, ENDPOINT, &format!("as_of={}", as_of), &snapshot, || {
        let periods = state
            .forecaster
            .year(&snapshot.ingested.subscriptions, as_of)?;
        record_diagnostics(ENDPOINT, periods.iter().map(|p| &p.diagnostics));

        let total = periods
            .iter()
            .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.projected_invoice_amount))
            .ok_or_else(|| anyhow::anyhow!("annual invoice total overflowed"))?;
        let engine_excluded = periods
            .iter()
            .map(|p| p.diagnostics.excluded_subscriptions)
            .max()
            .unwrap_or(0);

        Ok(AnnualForecastResponse {
            forecast_period: "12 months".to_string(),
            monthly_projections: periods.iter().map(MonthProjectionResponse::from).collect(),
            total_projected: money(total),
            excluded_subscriptions: snapshot.ingested.rejected_count() + engine_excluded,
            truncated_projections: periods
                .iter()
                .map(|p| p.diagnostics.truncated_projections)
                .sum(),
            generated_at: Utc::now(),
        })
    })?;

    tracing::info!(as_of = %as_of, total_projected = %response.total_projected, "Annual forecast served");
    Ok(Json(response))
}

fn parse_group_by(value: Option<&str>) -> Result<Option<GroupBy>, AppError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("category") => Ok(Some(GroupBy::Category)),
        Some("tier") | Some("mrr_tier") => Ok(Some(GroupBy::MrrTier)),
        Some(other) => Err(AppError::BadRequest(anyhow::anyhow!(
            "unknown group_by '{}', expected 'category' or 'tier'",
            other
        ))),
    }
}

/// GET /revenue/mrr?group_by=category|tier
pub async fn mrr_summary(
    State(state): State<AppState>,
    Query(params): Query<MrrParams>,
) -> Result<Json<MrrResponse>, AppError> {
    const ENDPOINT: &str = "mrr";
    let group_by = parse_group_by(params.group_by.as_deref())?;
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let key = format!("group_by={:?}", group_by);
    let response = cached(&state, ENDPOINT, &key, &snapshot, || {
        let result = aggregate(&snapshot.ingested.subscriptions, group_by);
        record_excluded(ENDPOINT, "engine", result.excluded_subscriptions);
        Ok(MrrResponse {
            total_mrr: money(result.total_mrr),
            arr: money(result.arr),
            arpu: money(result.arpu),
            active_subscriptions: result.active_subscriptions,
            paying_subscriptions: result.paying_subscriptions,
            paying_customers: result.paying_customers,
            excluded_subscriptions: snapshot.ingested.rejected_count()
                + result.excluded_subscriptions,
            errors: all_errors(&snapshot.ingested.rejected, &result.errors),
            group_by: params.group_by.clone(),
            groups: result.groups.iter().map(GroupResponse::from).collect(),
            generated_at: Utc::now(),
        })
    })?;

    tracing::info!(total_mrr = %response.total_mrr, "MRR summary served");
    Ok(Json(response))
}

/// GET /revenue/customers?min_mrr=
pub async fn customer_list(
    State(state): State<AppState>,
    Query(params): Query<CustomerParams>,
) -> Result<Json<CustomerListResponse>, AppError> {
    const ENDPOINT: &str = "customers";
    let snapshot = load_snapshot(&state, ENDPOINT).await?;

    let key = format!("min_mrr={:?}", params.min_mrr);
    let response = cached(&state, ENDPOINT, &key, &snapshot, || {
        let breakdown = customer_breakdown(&snapshot.ingested.subscriptions, params.min_mrr);
        record_excluded(ENDPOINT, "engine", breakdown.excluded_subscriptions);
        Ok(CustomerListResponse {
            total_customers: breakdown.customers.len(),
            total_mrr: money(breakdown.total_mrr),
            customers: breakdown
                .customers
                .iter()
                .map(CustomerMrrResponse::from)
                .collect(),
            excluded_subscriptions: snapshot.ingested.rejected_count()
                + breakdown.excluded_subscriptions,
            generated_at: Utc::now(),
        })
    })?;

    Ok(Json(response))
}
