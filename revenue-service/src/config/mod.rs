//! Service configuration.
//!
//! Loaded from an optional `configuration` file and `APP__*` environment
//! variables, e.g. `APP__PORT=3010` or `APP__SUBSCRIPTIONS__PATH=/data/subs.json`.

use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct RevenueConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Traces are exported only when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub subscriptions: SubscriptionSourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionSourceConfig {
    /// JSON array of subscription records.
    #[serde(default = "default_subscriptions_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Zero disables caching.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    #[serde(default = "default_max_events_per_item")]
    pub max_events_per_item: usize,
    #[serde(default = "default_max_quarters")]
    pub max_quarters: u32,
}

fn default_port() -> u16 {
    3010
}

fn default_service_name() -> String {
    "revenue-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_subscriptions_path() -> PathBuf {
    PathBuf::from("data/subscriptions.json")
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_max_events_per_item() -> usize {
    10_000
}

fn default_max_quarters() -> u32 {
    8
}

impl Default for SubscriptionSourceConfig {
    fn default() -> Self {
        Self {
            path: default_subscriptions_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_events_per_item: default_max_events_per_item(),
            max_quarters: default_max_quarters(),
        }
    }
}

impl RevenueConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
