//! Prometheus Metrics Registry - Monitor Observability
//!
//! Registers the sentinel's counters and gauges. All metrics follow the
//! naming convention `listing_sentinel_*`; per-monitor series carry a
//! `monitor` label (`events` / `listings`).

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Centralized Prometheus metrics for both monitors.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Ticks by monitor and outcome (ok, connection, fetch, anomaly).
    pub ticks: IntCounterVec,
    /// Alerts raised by monitor.
    pub alerts: IntCounterVec,
    /// Alert deliveries that failed.
    pub notify_failures: IntCounter,
    /// Log entries that failed to decode.
    pub decode_failures: IntCounter,
    /// FILTER→POLL downgrades.
    pub filter_downgrades: IntCounter,
    /// Fresh upstream connections opened.
    pub reconnects: IntCounter,
    /// Next block POLL mode will query.
    pub poll_cursor: IntGauge,
    /// Entries in the latest listing snapshot.
    pub snapshot_size: IntGauge,
    /// Current backoff delay per monitor (milliseconds).
    pub backoff_ms: IntGaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks = IntCounterVec::new(
            Opts::new("listing_sentinel_ticks_total", "Monitor ticks by outcome"),
            &["monitor", "outcome"],
        )?;

        let alerts = IntCounterVec::new(
            Opts::new("listing_sentinel_alerts_total", "Alerts raised"),
            &["monitor"],
        )?;

        let notify_failures = IntCounter::new(
            "listing_sentinel_notify_failures_total",
            "Alert deliveries that failed (swallowed)",
        )?;

        let decode_failures = IntCounter::new(
            "listing_sentinel_decode_failures_total",
            "Event logs skipped because they failed to decode",
        )?;

        let filter_downgrades = IntCounter::new(
            "listing_sentinel_filter_downgrades_total",
            "Switches from server-side filters to manual polling",
        )?;

        let reconnects = IntCounter::new(
            "listing_sentinel_rpc_connects_total",
            "Upstream RPC connections opened",
        )?;

        let poll_cursor = IntGauge::new(
            "listing_sentinel_poll_cursor",
            "Next block queried in poll mode",
        )?;

        let snapshot_size = IntGauge::new(
            "listing_sentinel_snapshot_size",
            "Entries in the latest listing snapshot",
        )?;

        let backoff_ms = IntGaugeVec::new(
            Opts::new("listing_sentinel_backoff_ms", "Current backoff delay"),
            &["monitor"],
        )?;

        // Register all metrics
        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(alerts.clone()))?;
        registry.register(Box::new(notify_failures.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(filter_downgrades.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(poll_cursor.clone()))?;
        registry.register(Box::new(snapshot_size.clone()))?;
        registry.register(Box::new(backoff_ms.clone()))?;

        Ok(Self {
            registry,
            ticks,
            alerts,
            notify_failures,
            decode_failures,
            filter_downgrades,
            reconnects,
            poll_cursor,
            snapshot_size,
            backoff_ms,
        })
    }

    /// Record one tick outcome.
    pub fn record_tick(&self, monitor: &str, outcome: &str) {
        self.ticks.with_label_values(&[monitor, outcome]).inc();
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
