//! Prometheus metrics for revenue-service.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Time spent computing a forecast response (cache misses only).
pub static FORECAST_COMPUTE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "revenue_forecast_compute_duration_seconds",
            "Forecast computation duration",
            vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        ),
        &["endpoint"]
    )
    .expect("Failed to register FORECAST_COMPUTE_DURATION")
});

/// HTTP request counter
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// HTTP request duration histogram
pub static HTTP_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Subscriptions left out of a computation
pub static EXCLUDED_SUBSCRIPTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Projections stopped by the iteration cap
pub static TRUNCATED_PROJECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Response cache lookups
pub static CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("revenue_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"]
        )
        .expect("Failed to register HTTP_REQUESTS_TOTAL")
    });

    HTTP_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "revenue_http_request_duration_seconds",
                "HTTP request duration"
            ),
            &["method", "path"]
        )
        .expect("Failed to register HTTP_REQUEST_DURATION")
    });

    EXCLUDED_SUBSCRIPTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "revenue_excluded_subscriptions_total",
                "Subscriptions excluded from a computation by endpoint and stage"
            ),
            &["endpoint", "stage"]
        )
        .expect("Failed to register EXCLUDED_SUBSCRIPTIONS_TOTAL")
    });

    TRUNCATED_PROJECTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "revenue_truncated_projections_total",
                "Projections cut short by the per-item iteration cap"
            ),
            &["endpoint"]
        )
        .expect("Failed to register TRUNCATED_PROJECTIONS_TOTAL")
    });

    CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("revenue_cache_lookups_total", "Forecast cache lookups"),
            &["endpoint", "result"]
        )
        .expect("Failed to register CACHE_LOOKUPS_TOTAL")
    });

    let _ = &*FORECAST_COMPUTE_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// Record subscriptions dropped at `stage` ("ingest" or "engine").
pub fn record_excluded(endpoint: &str, stage: &str, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(counter) = EXCLUDED_SUBSCRIPTIONS_TOTAL.get() {
        counter
            .with_label_values(&[endpoint, stage])
            .inc_by(count as u64);
    }
}

pub fn record_truncated(endpoint: &str, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(counter) = TRUNCATED_PROJECTIONS_TOTAL.get() {
        counter.with_label_values(&[endpoint]).inc_by(count as u64);
    }
}

pub fn record_cache_lookup(endpoint: &str, hit: bool) {
    if let Some(counter) = CACHE_LOOKUPS_TOTAL.get() {
        let result = if hit { "hit" } else { "miss" };
        counter.with_label_values(&[endpoint, result]).inc();
    }
}

pub fn record_compute_duration(endpoint: &str, duration_secs: f64) {
    FORECAST_COMPUTE_DURATION
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}
