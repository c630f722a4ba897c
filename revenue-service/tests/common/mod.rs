//! Test helper module for revenue-service integration tests.
//!
//! Each app reads its own temporary subscription snapshot.

#![allow(dead_code)]

use revenue_service::config::{
    CacheConfig, ForecastConfig, RevenueConfig, SubscriptionSourceConfig,
};
use revenue_service::services::init_metrics;
use revenue_service::startup::Application;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Active subscriptions used by most tests.
///
/// MRR: quarterly 797, monthly 1000, annual 100, trial 0. The canceled record
/// is filtered by the source and the fortnightly one is rejected at ingest.
pub const SNAPSHOT: &str = r#"[
    {"customer_id": "cus_quarterly", "subscription_id": "sub_q", "status": "active",
     "category": "saas", "current_period_start": "2025-08-15",
     "items": [{"amount": "2391", "interval": "month", "interval_count": 3}]},
    {"customer_id": "cus_monthly", "subscription_id": "sub_m", "status": "active",
     "category": "saas", "current_period_start": "2025-03-03",
     "items": [{"amount": "500", "interval": "month", "interval_count": 1},
               {"amount": "500", "interval": "month", "interval_count": 1}]},
    {"customer_id": "cus_annual", "subscription_id": "sub_a", "status": "active",
     "category": "services", "current_period_start": "2025-02-20",
     "items": [{"amount": "1200", "interval": "year", "interval_count": 1}]},
    {"customer_id": "cus_trial", "status": "active", "current_period_start": "2025-10-01",
     "items": []},
    {"customer_id": "cus_canceled", "status": "canceled", "current_period_start": "2025-01-01",
     "items": [{"amount": "999", "interval": "month"}]},
    {"customer_id": "cus_broken", "status": "active", "current_period_start": "2025-01-01",
     "items": [{"amount": "10", "interval": "fortnight"}]}
]"#;

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub client: reqwest::Client,
    snapshot: NamedTempFile,
}

impl TestApp {
    /// Spawn an app on a random port serving `snapshot`.
    pub async fn spawn(snapshot: &str) -> Self {
        init_metrics();

        let mut file = NamedTempFile::new().expect("Failed to create snapshot file");
        file.write_all(snapshot.as_bytes())
            .expect("Failed to write snapshot");

        let path = file.path().to_path_buf();
        Self::start(path, file).await
    }

    /// Spawn an app whose snapshot path does not exist.
    pub async fn spawn_without_snapshot() -> Self {
        let file = NamedTempFile::new().expect("Failed to create snapshot file");
        let missing = file.path().with_extension("missing.json");
        Self::start(missing, file).await
    }

    async fn start(path: PathBuf, snapshot: NamedTempFile) -> Self {
        let config = RevenueConfig {
            port: 0, // Random port
            service_name: "revenue-service-test".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            subscriptions: SubscriptionSourceConfig { path },
            cache: CacheConfig { ttl_seconds: 60 },
            forecast: ForecastConfig {
                max_events_per_item: 10_000,
                max_quarters: 8,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let http_port = app.http_port();
        let http_address = format!("http://127.0.0.1:{}", http_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            http_port,
            client,
            snapshot,
        }
    }

    /// Overwrite the snapshot the running app reads.
    pub fn replace_snapshot(&self, snapshot: &str) {
        std::fs::write(self.snapshot.path(), snapshot).expect("Failed to replace snapshot");
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.http_address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// GET `path`, assert 200 and parse the JSON body.
    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        let response = self.get(path).await;
        assert!(
            response.status().is_success(),
            "GET {} returned {}",
            path,
            response.status()
        );
        response.json().await.expect("Failed to parse JSON")
    }
}
