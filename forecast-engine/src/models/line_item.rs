//! Line item model.

use crate::error::EngineError;
use crate::interval::{BillingCycle, Interval};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One billed component of a subscription, as supplied by the caller.
///
/// `interval_count` stays optional here so a missing value is still visible
/// before ingestion applies the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    #[serde(default)]
    pub price_id: Option<String>,
    pub amount: Decimal,
    pub interval: String,
    #[serde(default)]
    pub interval_count: Option<i64>,
}

/// One billed component of a subscription after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub price_id: Option<String>,
    pub amount: Decimal,
    pub interval: Interval,
    pub interval_count: u32,
}

impl LineItem {
    pub fn new(amount: Decimal, interval: Interval, interval_count: u32) -> Self {
        Self {
            price_id: None,
            amount,
            interval,
            interval_count,
        }
    }

    /// Validated billing cycle for this item.
    pub fn cycle(&self) -> Result<BillingCycle, EngineError> {
        BillingCycle::new(self.interval, self.interval_count)
    }

    /// Checks the amount and interval contract shared by normalizer and projector.
    pub fn validate(&self) -> Result<BillingCycle, EngineError> {
        if self.amount < Decimal::ZERO {
            return Err(EngineError::NegativeAmount(self.amount));
        }
        self.cycle()
    }
}

impl TryFrom<LineItemRecord> for LineItem {
    type Error = EngineError;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        let interval: Interval = record.interval.parse()?;
        let interval_count = match record.interval_count {
            None => 1,
            Some(count) if count >= 1 => {
                u32::try_from(count).map_err(|_| EngineError::InvalidIntervalCount(count))?
            }
            Some(count) => return Err(EngineError::InvalidIntervalCount(count)),
        };

        let item = LineItem {
            price_id: record.price_id,
            amount: record.amount,
            interval,
            interval_count,
        };
        item.validate()?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(interval: &str, interval_count: Option<i64>) -> LineItemRecord {
        LineItemRecord {
            price_id: None,
            amount: dec!(99),
            interval: interval.to_string(),
            interval_count,
        }
    }

    #[test]
    fn test_missing_interval_count_defaults_to_one() {
        let item = LineItem::try_from(record("month", None)).unwrap();
        assert_eq!(item.interval_count, 1);
        assert_eq!(item, LineItem::try_from(record("month", Some(1))).unwrap());
    }

    #[test]
    fn test_zero_interval_count_rejected() {
        assert_eq!(
            LineItem::try_from(record("month", Some(0))),
            Err(EngineError::InvalidIntervalCount(0))
        );
        assert_eq!(
            LineItem::try_from(record("month", Some(-3))),
            Err(EngineError::InvalidIntervalCount(-3))
        );
    }

    #[test]
    fn test_unknown_interval_rejected() {
        assert!(matches!(
            LineItem::try_from(record("decade", None)),
            Err(EngineError::UnknownInterval(_))
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let item = LineItem::new(dec!(-5), Interval::Month, 1);
        assert_eq!(item.validate(), Err(EngineError::NegativeAmount(dec!(-5))));
    }

    #[test]
    fn test_zero_amount_is_valid() {
        let item = LineItem::new(Decimal::ZERO, Interval::Year, 1);
        assert!(item.validate().is_ok());
    }
}
