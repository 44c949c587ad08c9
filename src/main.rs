//! Listing Sentinel - Entry Point
//!
//! Watches for new token listings from two independent sources and
//! alerts on each. Runs until SIGINT or a fatal listing anomaly.
//!
//! Wiring sequence:
//! 1. Load .env, parse CLI flags, resolve config (file < env < CLI)
//! 2. Init tracing (JSON structured logging)
//! 3. Build the notifier (Telegram when credentials are set)
//! 4. Spawn health/metrics server (/live, /ready, /metrics)
//! 5. Spawn the AddToken event monitor (RPC filter / poll)
//! 6. Spawn the listing snapshot monitor (HTTP diff)
//! 7. Wait for SIGINT or a monitor exit → broadcast shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use listing_sentinel::adapters::chain::{RpcConnector, ADD_TOKEN_TOPIC};
use listing_sentinel::adapters::listing::HttpListingSource;
use listing_sentinel::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use listing_sentinel::adapters::notify;
use listing_sentinel::config::{self, AppConfig, Overrides};
use listing_sentinel::domain::{LogQuery, MonitorError, SnapshotDiffer};
use listing_sentinel::ports::Notifier;
use listing_sentinel::usecases::{
    EventFilterController, EventWatcher, FilterTimings, ListingWatcher, Monitor,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Resolve configuration ─────────────────────────────
    dotenv::dotenv().ok();
    let overrides = Overrides::parse();
    let config = config::loader::resolve(&overrides).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        events = config.event_monitor.enabled,
        listings = config.listing_monitor.enabled,
        "Starting listing sentinel"
    );

    // ── 3. Shutdown channel, metrics, notifier ──────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());
    let notifier = notify::from_config(&config.notifier).context("Failed to build notifier")?;
    let destination = config.notifier.chat_id.clone().unwrap_or_default();

    // ── 4. Health/metrics server ─────────────────────────────
    let health_handle = if config.metrics.enabled {
        let server = HealthServer::new(
            Arc::clone(&health),
            Arc::clone(&metrics),
            &config.metrics.bind_address,
        );
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(rx).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 5-6. Monitors ────────────────────────────────────────
    let mut monitors: JoinSet<Result<(), MonitorError>> = JoinSet::new();

    if config.event_monitor.enabled {
        let monitor = build_event_monitor(&config, &notifier, &destination, &metrics, &health)?;
        monitors.spawn(monitor.run(shutdown_tx.subscribe()));
    }
    if config.listing_monitor.enabled {
        let monitor = build_listing_monitor(&config, &notifier, &destination, &metrics, &health)?;
        monitors.spawn(monitor.run(shutdown_tx.subscribe()));
    }

    info!(monitors = monitors.len(), "All tasks spawned, sentinel is running");

    // ── 7. Wait for SIGINT or the first monitor exit ─────────
    let outcome: Result<()> = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
            Ok(())
        }
        Some(joined) = monitors.join_next() => match joined {
            Ok(Ok(())) => {
                warn!("Monitor exited without shutdown request");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Fatal monitor error, shutting down");
                Err(e.into())
            }
            Err(e) => {
                error!(error = %e, "Monitor task panicked");
                Err(anyhow::anyhow!("monitor task failed: {e}"))
            }
        },
    };

    // ── Graceful shutdown ────────────────────────────────────
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    let drain = async {
        while let Some(joined) = monitors.join_next().await {
            if let Ok(Err(e)) = joined {
                warn!(error = %e, "Monitor failed during shutdown");
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(10), drain).await.is_err() {
        warn!("Monitors did not stop within 10s, aborting");
        monitors.abort_all();
    }

    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    outcome
}

/// Wire the AddToken event monitor.
fn build_event_monitor(
    config: &AppConfig,
    notifier: &Arc<dyn Notifier>,
    destination: &str,
    metrics: &Arc<MetricsRegistry>,
    health: &Arc<HealthState>,
) -> Result<Monitor<EventWatcher>> {
    let section = &config.event_monitor;
    let contract: Address = section
        .contract
        .parse()
        .with_context(|| format!("Invalid contract address '{}'", section.contract))?;
    let constraint = section
        .price_feed
        .as_deref()
        .filter(|feed| !feed.trim().is_empty())
        .map(|feed| feed.trim().parse::<Address>())
        .transpose()
        .context("Invalid price feed address")?;

    let query = LogQuery {
        contract,
        signature: ADD_TOKEN_TOPIC,
        constraint,
    };
    let timings = FilterTimings {
        probe_timeout: section.probe_timeout(),
        request_timeout: config.rpc.request_timeout(),
        max_span: section.max_poll_span,
    };

    let connector = RpcConnector::new(&config.rpc);
    info!(
        endpoint = connector.endpoint().kind.label(),
        contract = %contract.to_checksum(None),
        from_block = %section.from_block,
        price_feed = ?constraint,
        "Event monitor configured"
    );

    let controller = EventFilterController::new(query, section.from_block, timings);
    let watcher = EventWatcher::new(Arc::new(connector), controller, &section.label, destination)
        .with_metrics(Arc::clone(metrics));

    Ok(Monitor::new(
        watcher,
        Arc::clone(notifier),
        config.backoff.build(),
        section.poll_interval(config.rpc.prefers_stream()),
    )
    .with_metrics(Arc::clone(metrics))
    .with_health(Arc::clone(health)))
}

/// Wire the listing snapshot monitor.
fn build_listing_monitor(
    config: &AppConfig,
    notifier: &Arc<dyn Notifier>,
    destination: &str,
    metrics: &Arc<MetricsRegistry>,
    health: &Arc<HealthState>,
) -> Result<Monitor<ListingWatcher>> {
    let section = &config.listing_monitor;
    let source = HttpListingSource::new(&section.url, section.request_timeout())
        .context("Failed to create listing client")?;
    let differ = SnapshotDiffer::new(section.anomaly_threshold, section.baseline_replace_above);

    info!(
        url = %section.url,
        interval_ms = section.poll_interval_ms,
        anomaly_threshold = section.anomaly_threshold,
        policy = ?section.anomaly_policy,
        "Listing monitor configured"
    );

    let watcher = ListingWatcher::new(
        Arc::new(source),
        differ,
        &section.label,
        destination,
        section.summary_interval(),
    )
    .with_metrics(Arc::clone(metrics));

    Ok(Monitor::new(
        watcher,
        Arc::clone(notifier),
        config.backoff.build(),
        section.poll_interval(),
    )
    .with_policy(section.anomaly_policy)
    .with_metrics(Arc::clone(metrics))
    .with_health(Arc::clone(health)))
}
