//! Where subscription records come from.

use crate::error::AppError;
use async_trait::async_trait;
use forecast_engine::{EngineError, SubscriptionRecord, ValidationError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Active records plus the ones that could not be read at all.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub records: Vec<SubscriptionRecord>,
    /// Records of the wrong shape, excluded alongside ingest rejections.
    pub malformed: Vec<ValidationError>,
}

/// Supplies the current set of active subscriptions.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Active subscriptions only; other statuses are dropped here.
    async fn active_subscriptions(&self) -> Result<SourceSnapshot, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

fn is_inactive(value: &Value) -> bool {
    value
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| !status.eq_ignore_ascii_case("active"))
}

/// Split raw records into active ones and the ones that failed to parse.
///
/// Records with a non-active status are dropped before parsing, so their
/// shape does not matter.
pub fn read_records(values: Vec<Value>) -> SourceSnapshot {
    let mut snapshot = SourceSnapshot::default();

    for (index, value) in values.into_iter().enumerate() {
        if is_inactive(&value) {
            continue;
        }
        let customer_id = value
            .get("customer_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<record {}>", index));
        let subscription_id = value
            .get("subscription_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match serde_json::from_value::<SubscriptionRecord>(value) {
            Ok(record) => snapshot.records.push(record),
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    record = index,
                    error = %e,
                    "Skipping malformed subscription record"
                );
                snapshot.malformed.push(ValidationError::for_subscription(
                    &customer_id,
                    subscription_id.as_deref(),
                    EngineError::MalformedRecord(e.to_string()),
                ));
            }
        }
    }

    snapshot
}

/// Reads a JSON array of subscription records from disk on every call, so a
/// replaced snapshot is picked up without a restart.
#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SubscriptionSource for JsonSnapshotSource {
    async fn active_subscriptions(&self) -> Result<SourceSnapshot, AppError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to read subscription snapshot");
            AppError::SourceError(anyhow::Error::new(e))
        })?;

        let values: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to parse subscription snapshot");
            AppError::SourceError(anyhow::Error::new(e))
        })?;

        let total = values.len();
        let snapshot = read_records(values);

        tracing::debug!(
            path = %self.path.display(),
            total = total,
            active = snapshot.records.len(),
            malformed = snapshot.malformed.len(),
            "Loaded subscription snapshot"
        );

        Ok(snapshot)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| AppError::ServiceUnavailable(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_filters_inactive_subscriptions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"customer_id": "cus_a", "status": "active", "current_period_start": "2025-01-01",
                  "items": [{{"amount": "10", "interval": "month", "interval_count": 1}}]}},
                {{"customer_id": "cus_b", "status": "canceled", "current_period_start": "2025-01-01",
                  "items": [{{"amount": "10", "interval": "month", "interval_count": 1}}]}},
                {{"customer_id": "cus_c", "status": "Active", "current_period_start": 1735689600}}
            ]"#
        )
        .unwrap();

        let source = JsonSnapshotSource::new(file.path());
        let active = source.active_subscriptions().await.unwrap();
        let ids: Vec<&str> = active.records.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["cus_a", "cus_c"]);
        assert!(active.malformed.is_empty());
    }

    #[test]
    fn test_malformed_record_does_not_hide_valid_ones() {
        let snapshot = read_records(serde_json::from_str::<Vec<Value>>(
            r#"[
                {"customer_id": "cus_ok", "status": "active", "current_period_start": "2025-01-01",
                 "items": [{"amount": "10", "interval": "month"}]},
                {"customer_id": "cus_bad", "subscription_id": "sub_bad", "status": "active",
                 "current_period_start": "2025-01-01",
                 "items": [{"amount": "abc", "interval": "month"}]},
                {"customer_id": "cus_count", "status": "active", "current_period_start": "2025-01-01",
                 "items": [{"amount": "10", "interval": "month", "interval_count": "3"}]},
                {"status": "active", "current_period_start": "2025-01-01", "items": []},
                {"customer_id": "cus_gone", "status": "canceled", "items": "not a list"}
            ]"#,
        ).unwrap());

        let ids: Vec<&str> = snapshot.records.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["cus_ok"]);

        let rejected: Vec<&str> = snapshot.malformed.iter().map(|e| e.customer_id.as_str()).collect();
        assert_eq!(rejected, vec!["cus_bad", "cus_count", "<record 3>"]);
        assert_eq!(snapshot.malformed[0].subscription_id.as_deref(), Some("sub_bad"));
        assert!(matches!(snapshot.malformed[0].reason, EngineError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_source_error() {
        let source = JsonSnapshotSource::new("/nonexistent/subscriptions.json");
        assert!(matches!(
            source.active_subscriptions().await,
            Err(AppError::SourceError(_))
        ));
        assert!(source.health_check().await.is_err());
    }
}
