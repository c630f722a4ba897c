//! Application startup and lifecycle management.

use crate::config::RevenueConfig;
use crate::error::AppError;
use crate::handlers::{health, revenue};
use crate::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use crate::services::{init_metrics, ForecastCache, JsonSnapshotSource, SubscriptionSource};
use axum::{middleware, routing::get, Router};
use forecast_engine::{Forecaster, ProjectionLimits};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: RevenueConfig,
    pub source: Arc<dyn SubscriptionSource>,
    pub cache: Arc<ForecastCache>,
    pub forecaster: Forecaster,
}

impl AppState {
    pub fn new(config: RevenueConfig, source: Arc<dyn SubscriptionSource>) -> Self {
        let cache = Arc::new(ForecastCache::new(Duration::from_secs(
            config.cache.ttl_seconds,
        )));
        let forecaster = Forecaster::new(ProjectionLimits {
            max_events_per_item: config.forecast.max_events_per_item,
        });
        Self {
            config,
            source,
            cache,
            forecaster,
        }
    }
}

/// Build the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        .route("/revenue/current-month", get(revenue::current_month))
        .route("/revenue/month-detail", get(revenue::month_detail))
        .route("/revenue/quarterly-forecast", get(revenue::quarterly_forecast))
        .route("/revenue/annual-forecast", get(revenue::annual_forecast))
        .route("/revenue/mrr", get(revenue::mrr_summary))
        .route("/revenue/customers", get(revenue::customer_list))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application reading subscriptions from the configured snapshot.
    pub async fn build(config: RevenueConfig) -> Result<Self, AppError> {
        let source: Arc<dyn SubscriptionSource> =
            Arc::new(JsonSnapshotSource::new(config.subscriptions.path.clone()));
        Self::build_with_source(config, source).await
    }

    pub async fn build_with_source(
        config: RevenueConfig,
        source: Arc<dyn SubscriptionSource>,
    ) -> Result<Self, AppError> {
        init_metrics();

        if let Err(e) = source.health_check().await {
            tracing::warn!(error = %e, "Subscription source not reachable at startup");
        }

        let state = AppState::new(config.clone(), source);

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Revenue service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let http_router = router(self.state);

        tracing::info!(
            service = "revenue-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, http_router)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "HTTP server error");
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
