//! Property tests for normalization invariants.

use chrono::NaiveDate;
use forecast_engine::{
    normalize, normalize_subscription, project, DateWindow, Interval, LineItem, LineItemRecord,
    Subscription,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

/// Cent amounts between $0.00 and $100,000.00.
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn interval_strategy() -> impl Strategy<Value = Interval> {
    prop_oneof![
        Just(Interval::Day),
        Just(Interval::Week),
        Just(Interval::Month),
        Just(Interval::Year),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Monthly items always sum, never overwrite.
    #[test]
    fn prop_monthly_items_accumulate(amounts in prop::collection::vec(amount_strategy(), 1..8)) {
        let items = amounts
            .iter()
            .map(|a| LineItem::new(*a, Interval::Month, 1))
            .collect();
        let sub = Subscription::new("cus_prop", anchor(), items);

        let expected: Decimal = amounts.iter().copied().sum();
        prop_assert_eq!(normalize_subscription(&sub).unwrap(), expected);
    }

    /// Subscription MRR equals the sum of its items' MRR for any cadence mix.
    #[test]
    fn prop_subscription_is_sum_of_items(
        items in prop::collection::vec((amount_strategy(), interval_strategy(), 1u32..13), 1..6)
    ) {
        let items: Vec<LineItem> = items
            .into_iter()
            .map(|(amount, interval, count)| LineItem::new(amount, interval, count))
            .collect();
        let mut expected = Decimal::ZERO;
        for item in &items {
            expected += normalize(item).unwrap();
        }
        let sub = Subscription::new("cus_prop", anchor(), items);
        prop_assert_eq!(normalize_subscription(&sub).unwrap(), expected);
    }

    /// Billing every N months normalizes to amount / N.
    #[test]
    fn prop_month_interval_divides_by_count(amount in amount_strategy(), count in 1u32..25) {
        let item = LineItem::new(amount, Interval::Month, count);
        prop_assert_eq!(normalize(&item).unwrap(), amount / Decimal::from(count));
    }

    /// A record without interval_count ingests exactly like interval_count = 1.
    #[test]
    fn prop_missing_count_matches_explicit_one(amount in amount_strategy(), interval in interval_strategy()) {
        let missing = LineItem::try_from(LineItemRecord {
            price_id: None,
            amount,
            interval: interval.as_str().to_string(),
            interval_count: None,
        })
        .unwrap();
        let explicit = LineItem::try_from(LineItemRecord {
            price_id: None,
            amount,
            interval: interval.as_str().to_string(),
            interval_count: Some(1),
        })
        .unwrap();

        prop_assert_eq!(&missing, &explicit);
        prop_assert_eq!(normalize(&missing).unwrap(), normalize(&explicit).unwrap());
    }

    /// A monthly subscription invoices exactly once in every calendar month
    /// on or after its anchor month.
    #[test]
    fn prop_monthly_invoices_once_per_month(day in 1u32..=31, month_offset in 0u32..36) {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let sub = Subscription::new(
            "cus_prop",
            anchor,
            vec![LineItem::new(Decimal::ONE_HUNDRED, Interval::Month, 1)],
        );
        let year = 2024 + (month_offset / 12) as i32;
        let month = month_offset % 12 + 1;
        let projection = project(&sub, DateWindow::month(year, month).unwrap()).unwrap();
        prop_assert_eq!(projection.events.len(), 1);
    }
}
