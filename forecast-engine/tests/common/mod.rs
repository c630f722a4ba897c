//! Shared fixtures for forecast-engine integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use forecast_engine::{ingest, Subscription, SubscriptionRecord};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Parse raw records the way a caller hands them over.
pub fn records(json: serde_json::Value) -> Vec<SubscriptionRecord> {
    serde_json::from_value(json).expect("Failed to parse subscription records")
}

/// Parse and ingest, asserting nothing was rejected.
pub fn subscriptions(json: serde_json::Value) -> Vec<Subscription> {
    let ingested = ingest(records(json));
    assert!(
        ingested.rejected.is_empty(),
        "unexpected rejections: {:?}",
        ingested.rejected
    );
    ingested.subscriptions
}
