//! Error types for the forecasting engine.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// A violation of an input contract on a single value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("amount must not be negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("unknown billing interval '{0}'")]
    UnknownInterval(String),

    #[error("interval_count must be at least 1, got {0}")]
    InvalidIntervalCount(i64),

    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("window end {end} is not after window start {start}")]
    EmptyWindow { start: String, end: String },

    #[error("amount arithmetic overflowed: {0}")]
    AmountOverflow(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// An [`EngineError`] attributed to the subscription (and line item) it came from.
///
/// Per-subscription failures are collected into result diagnostics instead of
/// aborting a whole population.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("subscription for customer '{customer_id}'{} rejected: {reason}", item_suffix(.item_index))]
pub struct ValidationError {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub item_index: Option<usize>,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: EngineError,
}

impl ValidationError {
    pub fn for_item(
        customer_id: &str,
        subscription_id: Option<&str>,
        item_index: usize,
        reason: EngineError,
    ) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            subscription_id: subscription_id.map(str::to_string),
            item_index: Some(item_index),
            reason,
        }
    }

    pub fn for_subscription(
        customer_id: &str,
        subscription_id: Option<&str>,
        reason: EngineError,
    ) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            subscription_id: subscription_id.map(str::to_string),
            item_index: None,
            reason,
        }
    }
}

fn item_suffix(item_index: &Option<usize>) -> String {
    match item_index {
        Some(index) => format!(" (item {})", index),
        None => String::new(),
    }
}

fn serialize_reason<S>(reason: &EngineError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&reason.to_string())
}
