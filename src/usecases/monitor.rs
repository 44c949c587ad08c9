//! Monitor Loop - Shared Tick / Alert / Backoff Driver
//!
//! Both monitors run the same loop, parameterized by a `Watcher`:
//! 1. Check for shutdown
//! 2. Run one complete tick (never interrupted mid-way)
//! 3. Deliver any alerts, best effort
//! 4. Sleep for the poll interval, or the backoff delay after a failure
//!
//! Anomalies are the only fatal outcome, and only under
//! `AnomalyPolicy::Abort`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info, instrument, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::domain::{AlertMessage, AnomalyPolicy, Backoff, MonitorError, TickError};
use crate::ports::Notifier;

/// One monitor's detection step.
#[async_trait]
pub trait Watcher: Send {
  /// Short name used in logs and metric labels.
  fn name(&self) -> &'static str;

  /// Perform one complete fetch/compare pass.
  async fn tick(&mut self) -> Result<Vec<AlertMessage>, TickError>;
}

/// Generic monitor loop around a `Watcher`.
pub struct Monitor<W: Watcher> {
  watcher: W,
  notifier: Arc<dyn Notifier>,
  backoff: Backoff,
  interval: Duration,
  policy: AnomalyPolicy,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Option<Arc<HealthState>>,
}

impl<W: Watcher> Monitor<W> {
  /// Create a monitor that aborts on anomalies.
  pub fn new(
    watcher: W,
    notifier: Arc<dyn Notifier>,
    backoff: Backoff,
    interval: Duration,
  ) -> Self {
    Self {
      watcher,
      notifier,
      backoff,
      interval,
      policy: AnomalyPolicy::Abort,
      metrics: None,
      health: None,
    }
  }

  /// Set the anomaly policy.
  pub fn with_policy(mut self, policy: AnomalyPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Attach Prometheus metrics.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Attach readiness tracking.
  pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
    self.health = Some(health);
    self
  }

  /// Borrow the watcher.
  pub fn watcher(&self) -> &W {
    &self.watcher
  }

  /// Current backoff state.
  pub fn backoff(&self) -> &Backoff {
    &self.backoff
  }

  /// Loop until shutdown or a fatal anomaly.
  #[instrument(skip_all, fields(monitor = self.watcher.name()))]
  pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), MonitorError> {
    info!(interval_ms = self.interval.as_millis() as u64, "Monitor started");

    loop {
      match shutdown_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Closed) => break,
        Err(TryRecvError::Empty) | Err(TryRecvError::Lagged(_)) => {}
      }

      let pause = self.step().await?;

      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => break,
        _ = tokio::time::sleep(pause) => {}
      }
    }

    info!("Monitor stopped");
    Ok(())
  }

  /// Run one tick and return how long to pause before the next.
  pub async fn step(&mut self) -> Result<Duration, MonitorError> {
    let name = self.watcher.name();

    match self.watcher.tick().await {
      Ok(alerts) => {
        self.record(name, "ok");
        for alert in &alerts {
          self.dispatch(name, alert).await;
        }
        self.backoff.on_success();
        self.set_backoff_gauge(name, Duration::ZERO);
        Ok(self.interval)
      }
      Err(TickError::Anomaly(anomaly)) => {
        self.record(name, "anomaly");
        match self.policy {
          AnomalyPolicy::Abort => {
            error!(
              count = anomaly.count,
              threshold = anomaly.threshold,
              symbols = ?anomaly.symbols,
              "Listing anomaly detected, stopping"
            );
            Err(MonitorError::Anomaly {
              monitor: name,
              source: anomaly,
            })
          }
          AnomalyPolicy::Suppress => {
            warn!(
              count = anomaly.count,
              threshold = anomaly.threshold,
              symbols = ?anomaly.symbols,
              "Listing anomaly suppressed, no alerts sent"
            );
            Ok(self.interval)
          }
        }
      }
      Err(e) => {
        let outcome = match &e {
          TickError::Connection(_) => "connection",
          _ => "fetch",
        };
        self.record(name, outcome);
        let delay = self.backoff.on_failure();
        self.set_backoff_gauge(name, delay);
        warn!(
          error = %e,
          failures = self.backoff.failures(),
          retry_in_ms = delay.as_millis() as u64,
          "Tick failed, backing off"
        );
        Ok(delay)
      }
    }
  }

  async fn dispatch(&self, name: &str, alert: &AlertMessage) {
    info!(kind = alert.kind.label(), alert = %alert, "ALERT");
    if let Some(metrics) = &self.metrics {
      metrics.alerts.with_label_values(&[name]).inc();
    }
    if let Err(e) = self.notifier.notify(alert).await {
      warn!(error = %e, kind = alert.kind.label(), "Alert delivery failed");
      if let Some(metrics) = &self.metrics {
        metrics.notify_failures.inc();
      }
    }
  }

  fn record(&self, name: &str, outcome: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.record_tick(name, outcome);
    }
    if let Some(health) = &self.health {
      health.set(name, outcome == "ok");
    }
  }

  fn set_backoff_gauge(&self, name: &str, delay: Duration) {
    if let Some(metrics) = &self.metrics {
      metrics
        .backoff_ms
        .with_label_values(&[name])
        .set(delay.as_millis() as i64);
    }
  }
}
