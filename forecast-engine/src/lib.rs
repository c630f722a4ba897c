//! forecast-engine: billing-cycle normalization and revenue forecasting.
//!
//! The engine is a set of pure functions over an immutable snapshot of active
//! subscriptions. Raw records enter through [`ingest`], which applies defaults
//! and validates line items. From there two independent paths exist:
//!
//! - [`normalizer`] and [`aggregator`] answer "what is the steady-state monthly
//!   run rate" (MRR, ARR, grouped breakdowns).
//! - [`projector`] and [`forecaster`] answer "how much cash actually lands in a
//!   given calendar span" by walking each subscription's billing anchor forward.
//!
//! Both paths share [`interval`] so they can never disagree about what a
//! billing cycle means. Amounts are exact [`rust_decimal::Decimal`] values;
//! nothing in this crate rounds.

pub mod aggregator;
pub mod error;
pub mod forecaster;
pub mod ingest;
pub mod interval;
pub mod models;
pub mod normalizer;
pub mod period;
pub mod projector;

pub use aggregator::{
    aggregate, customer_breakdown, AggregateResult, CustomerBreakdown, CustomerMrr, GroupBy,
    GroupSummary, MrrTier,
};
pub use error::{EngineError, ValidationError};
pub use forecaster::{
    forecast_current_month, forecast_month, forecast_quarters, forecast_year, CurrentMonthForecast,
    Diagnostics, ForecastPeriod, Forecaster, WeekCollection,
};
pub use ingest::{ingest, Ingested};
pub use interval::{BillingCycle, CycleStep, Interval};
pub use models::{
    AnchorValue, InvoiceEvent, LineItem, LineItemRecord, Subscription, SubscriptionRecord,
};
pub use normalizer::{normalize, normalize_item_detail, normalize_subscription, ItemDetail};
pub use period::{first_of_month, month_label, month_weeks, DateWindow, QuarterSpan, WeekBucket};
pub use projector::{project, project_with_limits, Projection, ProjectionLimits};
