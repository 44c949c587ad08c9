//! Event Watcher - On-Chain AddToken Monitor
//!
//! Owns at most one upstream connection at a time. A tick:
//! 1. Connect if there is no live connection (fresh session, PROBE)
//! 2. Fetch logs through the filter controller
//! 3. Decode each log; malformed entries are skipped, not fatal
//! 4. Turn every decoded event into an alert
//!
//! After a failed fetch the connection is checked; a dead one is dropped
//! so the next tick opens a replacement.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::chain::decode_add_token;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{AlertMessage, FilterMode, TickError};
use crate::ports::{Connector, EventSource};
use crate::usecases::filter_controller::EventFilterController;
use crate::usecases::monitor::Watcher;

/// `Watcher` for contract AddToken events.
pub struct EventWatcher {
  connector: Arc<dyn Connector>,
  source: Option<Arc<dyn EventSource>>,
  controller: EventFilterController,
  /// Alert title.
  label: String,
  /// Alert destination (chat id).
  destination: String,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl EventWatcher {
  /// Create a watcher with no connection yet.
  pub fn new(
    connector: Arc<dyn Connector>,
    controller: EventFilterController,
    label: impl Into<String>,
    destination: impl Into<String>,
  ) -> Self {
    Self {
      connector,
      source: None,
      controller,
      label: label.into(),
      destination: destination.into(),
      metrics: None,
    }
  }

  /// Attach Prometheus metrics.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Filter controller state.
  pub fn controller(&self) -> &EventFilterController {
    &self.controller
  }

  /// Whether a connection is currently held.
  pub fn is_connected(&self) -> bool {
    self.source.is_some()
  }

  async fn ensure_connected(&mut self) -> Result<Arc<dyn EventSource>, TickError> {
    if let Some(source) = &self.source {
      return Ok(Arc::clone(source));
    }

    let source = self.connector.connect().await?;
    self.controller.reset_session();
    info!(
      transport = source.transport().label(),
      cursor = ?self.controller.cursor(),
      "Event source connected"
    );
    if let Some(metrics) = &self.metrics {
      metrics.reconnects.inc();
    }
    self.source = Some(Arc::clone(&source));
    Ok(source)
  }
}

#[async_trait]
impl Watcher for EventWatcher {
  fn name(&self) -> &'static str {
    "events"
  }

  async fn tick(&mut self) -> Result<Vec<AlertMessage>, TickError> {
    let source = self.ensure_connected().await?;
    let before = self.controller.mode();

    let fetched = self.controller.fetch(source.as_ref()).await;

    if let Some(metrics) = &self.metrics {
      if before != FilterMode::Poll && self.controller.mode() == FilterMode::Poll {
        metrics.filter_downgrades.inc();
      }
      if let Some(cursor) = self.controller.cursor() {
        metrics.poll_cursor.set(cursor as i64);
      }
    }

    let logs = match fetched {
      Ok(logs) => logs,
      Err(e) => {
        if !source.is_live().await {
          warn!(error = %e, "Event source unresponsive, dropping connection");
          self.source = None;
        }
        return Err(e.into());
      }
    };

    let mut alerts = Vec::with_capacity(logs.len());
    for log in &logs {
      match decode_add_token(log) {
        Ok(event) => {
          info!(
            block = event.block_number,
            tx = %event.tx_hash,
            currency = %event.currency_checksum(),
            price_feed = %event.price_feed_checksum(),
            fixed_price = event.fixed_price,
            "AddToken event"
          );
          alerts.push(AlertMessage::token_added(&event, &self.label, &self.destination));
        }
        Err(e) => {
          warn!(
            error = %e,
            tx = ?log.transaction_hash,
            block = ?log.block_number,
            "Skipping undecodable log"
          );
          if let Some(metrics) = &self.metrics {
            metrics.decode_failures.inc();
          }
        }
      }
    }

    Ok(alerts)
  }
}
