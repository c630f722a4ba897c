//! Subscription model.

use super::line_item::{LineItem, LineItemRecord};
use crate::error::{EngineError, ValidationError};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Billing anchor as it arrives from a billing provider: either a unix
/// timestamp in seconds or an ISO-8601 date/timestamp string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnchorValue {
    Timestamp(i64),
    Text(String),
}

impl AnchorValue {
    /// Calendar date of the anchor (UTC for timestamps).
    pub fn to_date(&self) -> Result<NaiveDate, EngineError> {
        match self {
            AnchorValue::Timestamp(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| EngineError::InvalidDate(secs.to_string())),
            AnchorValue::Text(text) => {
                let text = text.trim();
                if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                    return Ok(date);
                }
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.date_naive())
                    .map_err(|_| EngineError::InvalidDate(text.to_string()))
            }
        }
    }
}

/// Raw active-subscription record supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub customer_id: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub category: Option<String>,
    pub current_period_start: AnchorValue,
    #[serde(default)]
    pub items: Vec<LineItemRecord>,
}

/// One customer's active billing agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub status: String,
    pub category: Option<String>,
    /// Date from which recurring periods are computed.
    pub billing_anchor: NaiveDate,
    pub items: Vec<LineItem>,
}

impl Subscription {
    pub fn new(customer_id: impl Into<String>, billing_anchor: NaiveDate, items: Vec<LineItem>) -> Self {
        Self {
            customer_id: customer_id.into(),
            subscription_id: None,
            status: "active".to_string(),
            category: None,
            billing_anchor,
            items,
        }
    }

    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn item_error(&self, index: usize, reason: EngineError) -> ValidationError {
        ValidationError::for_item(
            &self.customer_id,
            self.subscription_id.as_deref(),
            index,
            reason,
        )
    }

    pub(crate) fn subscription_error(&self, reason: EngineError) -> ValidationError {
        ValidationError::for_subscription(&self.customer_id, self.subscription_id.as_deref(), reason)
    }
}

impl TryFrom<SubscriptionRecord> for Subscription {
    type Error = ValidationError;

    fn try_from(record: SubscriptionRecord) -> Result<Self, Self::Error> {
        let billing_anchor = record.current_period_start.to_date().map_err(|e| {
            ValidationError::for_subscription(
                &record.customer_id,
                record.subscription_id.as_deref(),
                e,
            )
        })?;

        let mut items = Vec::with_capacity(record.items.len());
        for (index, item) in record.items.into_iter().enumerate() {
            let item = LineItem::try_from(item).map_err(|e| {
                ValidationError::for_item(
                    &record.customer_id,
                    record.subscription_id.as_deref(),
                    index,
                    e,
                )
            })?;
            items.push(item);
        }

        Ok(Subscription {
            customer_id: record.customer_id,
            subscription_id: record.subscription_id,
            status: record.status,
            category: record.category,
            billing_anchor,
            items,
        })
    }
}
