//! Monthly-equivalent normalization of line items and subscriptions.

use crate::error::{EngineError, ValidationError};
use crate::models::{LineItem, Subscription};
use rust_decimal::Decimal;
use serde::Serialize;

/// Monthly-equivalent value of one line item.
///
/// The item must already carry an explicit `interval_count`; a zero count or a
/// negative amount is reported, never coerced.
pub fn normalize(item: &LineItem) -> Result<Decimal, EngineError> {
    item.validate()?.monthly_equivalent(item.amount)
}

/// Sum of the monthly-equivalent values of every item in the subscription.
pub fn normalize_subscription(sub: &Subscription) -> Result<Decimal, ValidationError> {
    let mut total = Decimal::ZERO;
    for (index, item) in sub.items.iter().enumerate() {
        let mrr = normalize(item).map_err(|e| sub.item_error(index, e))?;
        total = total.checked_add(mrr).ok_or_else(|| {
            let reason = EngineError::AmountOverflow(format!("MRR total {} + {}", total, mrr));
            sub.item_error(index, reason)
        })?;
    }
    Ok(total)
}

/// One line item with its monthly-equivalent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub price_id: Option<String>,
    pub amount: Decimal,
    pub interval: String,
    pub interval_count: u32,
    pub monthly_equivalent: Decimal,
}

/// Per-item breakdown of a subscription's MRR.
pub fn normalize_item_detail(sub: &Subscription) -> Result<Vec<ItemDetail>, ValidationError> {
    sub.items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let monthly_equivalent = normalize(item).map_err(|e| sub.item_error(index, e))?;
            Ok(ItemDetail {
                price_id: item.price_id.clone(),
                amount: item.amount,
                interval: item.interval.as_str().to_string(),
                interval_count: item.interval_count,
                monthly_equivalent,
            })
        })
        .collect()
}
