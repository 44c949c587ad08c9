//! Health Check Server - Liveness, Readiness and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness means at
//! least one monitor's most recent tick succeeded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::prometheus::MetricsRegistry;

/// Per-monitor health flags updated after every tick.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Last event-monitor tick succeeded.
    pub events_ok: AtomicBool,
    /// Last listing-monitor tick succeeded.
    pub listings_ok: AtomicBool,
}

impl HealthState {
    /// Create a new health state (nothing healthy until a tick succeeds).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a tick for `monitor`.
    pub fn set(&self, monitor: &str, ok: bool) {
        match monitor {
            "events" => self.events_ok.store(ok, Ordering::Relaxed),
            "listings" => self.listings_ok.store(ok, Ordering::Relaxed),
            _ => {}
        }
    }

    /// Check if the sentinel is doing useful work.
    pub fn is_ready(&self) -> bool {
        self.events_ok.load(Ordering::Relaxed) || self.listings_ok.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
}

/// Axum-based health + metrics HTTP server.
pub struct HealthServer {
    state: AppState,
    bind_address: String,
}

impl HealthServer {
    /// Create a new server.
    pub fn new(
        health: Arc<HealthState>,
        metrics: Arc<MetricsRegistry>,
        bind_address: &str,
    ) -> Self {
        Self {
            state: AppState { health, metrics },
            bind_address: bind_address.to_string(),
        }
    }

    /// Build the router (exposed for tests).
    fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(self.state.clone())
    }

    /// Serve until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!("Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 once a monitor tick has succeeded.
    async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
        if state.health.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    /// Prometheus scrape endpoint.
    async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
        state.metrics.render()
    }
}
