//! Ingestion boundary: raw records to validated subscriptions.
//!
//! Defaults (`interval_count = 1`) are applied here and nowhere else.

use crate::error::ValidationError;
use crate::models::{Subscription, SubscriptionRecord};

/// Result of ingesting a population of raw records.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub subscriptions: Vec<Subscription>,
    pub rejected: Vec<ValidationError>,
}

impl Ingested {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Convert every record, keeping going past malformed ones.
pub fn ingest<I>(records: I) -> Ingested
where
    I: IntoIterator<Item = SubscriptionRecord>,
{
    let mut ingested = Ingested::default();

    for record in records {
        match Subscription::try_from(record) {
            Ok(subscription) => ingested.subscriptions.push(subscription),
            Err(e) => {
                tracing::warn!(
                    customer_id = %e.customer_id,
                    subscription_id = ?e.subscription_id,
                    item_index = ?e.item_index,
                    error = %e.reason,
                    "Rejected subscription record"
                );
                ingested.rejected.push(e);
            }
        }
    }

    tracing::debug!(
        accepted = ingested.subscriptions.len(),
        rejected = ingested.rejected.len(),
        "Ingested subscription records"
    );

    ingested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnchorValue, LineItemRecord};
    use rust_decimal_macros::dec;

    fn record(customer_id: &str, interval: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            customer_id: customer_id.to_string(),
            subscription_id: None,
            status: "active".to_string(),
            category: None,
            current_period_start: AnchorValue::Text("2025-06-01".to_string()),
            items: vec![LineItemRecord {
                price_id: None,
                amount: dec!(50),
                interval: interval.to_string(),
                interval_count: None,
            }],
        }
    }

    #[test]
    fn test_bad_record_does_not_abort_batch() {
        let ingested = ingest(vec![
            record("cus_1", "month"),
            record("cus_2", "lunar_cycle"),
            record("cus_3", "year"),
        ]);

        assert_eq!(ingested.subscriptions.len(), 2);
        assert_eq!(ingested.rejected_count(), 1);
        assert_eq!(ingested.rejected[0].customer_id, "cus_2");
        assert_eq!(ingested.rejected[0].item_index, Some(0));
    }

    #[test]
    fn test_empty_input() {
        let ingested = ingest(Vec::new());
        assert!(ingested.subscriptions.is_empty());
        assert!(ingested.rejected.is_empty());
    }
}
