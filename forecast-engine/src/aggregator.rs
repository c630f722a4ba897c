//! MRR aggregation across a subscription population.

use crate::error::{EngineError, ValidationError};
use crate::models::Subscription;
use crate::normalizer::{normalize_item_detail, normalize_subscription, ItemDetail};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashSet;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// `running + mrr`, provided twelve times the result still fits.
///
/// Checking ARR headroom at admission keeps every later `* 12` infallible.
fn admit(running: Decimal, mrr: Decimal) -> Result<Decimal, EngineError> {
    running
        .checked_add(mrr)
        .filter(|total| total.checked_mul(MONTHS_PER_YEAR).is_some())
        .ok_or_else(|| EngineError::AmountOverflow(format!("MRR total {} + {}", running, mrr)))
}

/// Label used for subscriptions without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Grouping dimension for [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// The subscription's `category` label.
    Category,
    /// Size band of the subscription's normalized MRR. Non-paying
    /// subscriptions have no tier.
    MrrTier,
}

/// MRR size band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MrrTier {
    Enterprise,
    HighValue,
    Standard,
    Growth,
    Starter,
}

impl MrrTier {
    pub fn from_mrr(mrr: Decimal) -> Self {
        if mrr >= dec!(5000) {
            MrrTier::Enterprise
        } else if mrr >= dec!(1000) {
            MrrTier::HighValue
        } else if mrr >= dec!(500) {
            MrrTier::Standard
        } else if mrr >= dec!(100) {
            MrrTier::Growth
        } else {
            MrrTier::Starter
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MrrTier::Enterprise => "Enterprise ($5K+)",
            MrrTier::HighValue => "High-Value ($1K-$5K)",
            MrrTier::Standard => "Standard ($500-$1K)",
            MrrTier::Growth => "Growth ($100-$500)",
            MrrTier::Starter => "Starter (<$100)",
        }
    }
}

/// Totals for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    /// Every valid subscription in the group, paying or not.
    pub active_subscriptions: usize,
    /// Distinct customers with non-zero MRR in the group.
    pub customer_count: usize,
    pub total_mrr: Decimal,
    pub arr: Decimal,
}

/// Population-level MRR figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    /// Every valid subscription, including zero-amount and empty ones.
    pub active_subscriptions: usize,
    /// Subscriptions with non-zero normalized MRR.
    pub paying_subscriptions: usize,
    /// Distinct customers behind the paying subscriptions.
    pub paying_customers: usize,
    /// Subscriptions dropped because they failed validation.
    pub excluded_subscriptions: usize,
    pub errors: Vec<ValidationError>,
    pub total_mrr: Decimal,
    pub arr: Decimal,
    /// Average MRR per paying customer.
    pub arpu: Decimal,
    /// Groups in order of first occurrence. Empty when no grouping was requested.
    pub groups: Vec<GroupSummary>,
}

struct GroupAccumulator<'a> {
    key: String,
    active_subscriptions: usize,
    customers: HashSet<&'a str>,
    total_mrr: Decimal,
}

impl GroupAccumulator<'_> {
    fn finish(self) -> GroupSummary {
        GroupSummary {
            key: self.key,
            active_subscriptions: self.active_subscriptions,
            customer_count: self.customers.len(),
            total_mrr: self.total_mrr,
            arr: self.total_mrr * MONTHS_PER_YEAR,
        }
    }
}

fn group_key(sub: &Subscription, mrr: Decimal, group_by: GroupBy) -> Option<String> {
    match group_by {
        GroupBy::Category => Some(
            sub.category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        ),
        GroupBy::MrrTier if mrr.is_zero() => None,
        GroupBy::MrrTier => Some(MrrTier::from_mrr(mrr).label().to_string()),
    }
}

/// Sum normalized MRR across the population, optionally grouped.
pub fn aggregate(subscriptions: &[Subscription], group_by: Option<GroupBy>) -> AggregateResult {
    let mut errors = Vec::new();
    let mut active_subscriptions = 0;
    let mut paying_subscriptions = 0;
    let mut paying_customers: HashSet<&str> = HashSet::new();
    let mut total_mrr = Decimal::ZERO;
    let mut groups: Vec<GroupAccumulator<'_>> = Vec::new();

    for sub in subscriptions {
        let admitted = normalize_subscription(sub).and_then(|mrr| {
            admit(total_mrr, mrr)
                .map(|total| (mrr, total))
                .map_err(|e| sub.subscription_error(e))
        });
        let mrr = match admitted {
            Ok((mrr, total)) => {
                total_mrr = total;
                mrr
            }
            Err(e) => {
                tracing::warn!(
                    customer_id = %sub.customer_id,
                    error = %e,
                    "Excluding subscription from MRR aggregate"
                );
                errors.push(e);
                continue;
            }
        };

        active_subscriptions += 1;
        let paying = !mrr.is_zero();
        if paying {
            paying_subscriptions += 1;
            paying_customers.insert(sub.customer_id.as_str());
        }

        let Some(key) = group_by.and_then(|g| group_key(sub, mrr, g)) else {
            continue;
        };
        let index = match groups.iter().position(|g| g.key == key) {
            Some(index) => index,
            None => {
                groups.push(GroupAccumulator {
                    key,
                    active_subscriptions: 0,
                    customers: HashSet::new(),
                    total_mrr: Decimal::ZERO,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        group.active_subscriptions += 1;
        if paying {
            group.customers.insert(sub.customer_id.as_str());
            group.total_mrr += mrr;
        }
    }

    let paying_customer_count = paying_customers.len();
    let arpu = if paying_customer_count == 0 {
        Decimal::ZERO
    } else {
        total_mrr / Decimal::from(paying_customer_count)
    };

    AggregateResult {
        active_subscriptions,
        paying_subscriptions,
        paying_customers: paying_customer_count,
        excluded_subscriptions: errors.len(),
        errors,
        total_mrr,
        arr: total_mrr * MONTHS_PER_YEAR,
        arpu,
        groups: groups.into_iter().map(GroupAccumulator::finish).collect(),
    }
}

/// MRR of one paying subscription with its item breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerMrr {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub category: Option<String>,
    pub mrr: Decimal,
    pub billing_anchor: chrono::NaiveDate,
    pub items: Vec<ItemDetail>,
}

/// Per-subscription MRR listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerBreakdown {
    pub customers: Vec<CustomerMrr>,
    pub total_mrr: Decimal,
    pub excluded_subscriptions: usize,
    pub errors: Vec<ValidationError>,
}

/// List paying subscriptions by MRR, largest first.
///
/// `min_mrr` drops subscriptions below the threshold.
pub fn customer_breakdown(
    subscriptions: &[Subscription],
    min_mrr: Option<Decimal>,
) -> CustomerBreakdown {
    let mut customers = Vec::new();
    let mut errors = Vec::new();
    let mut total_mrr = Decimal::ZERO;

    for sub in subscriptions {
        let items = match normalize_item_detail(sub) {
            Ok(items) => items,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let mrr = items.iter().map(|item| item.monthly_equivalent).sum::<Decimal>();
        if mrr.is_zero() || min_mrr.is_some_and(|min| mrr < min) {
            continue;
        }
        match admit(total_mrr, mrr) {
            Ok(total) => total_mrr = total,
            Err(e) => {
                errors.push(sub.subscription_error(e));
                continue;
            }
        }
        customers.push(CustomerMrr {
            customer_id: sub.customer_id.clone(),
            subscription_id: sub.subscription_id.clone(),
            category: sub.category.clone(),
            mrr,
            billing_anchor: sub.billing_anchor,
            items,
        });
    }

    customers.sort_by(|a, b| {
        b.mrr
            .cmp(&a.mrr)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    CustomerBreakdown {
        customers,
        total_mrr,
        excluded_subscriptions: errors.len(),
        errors,
    }
}
