//! Listing Watcher - Exchange Listing Snapshot Monitor
//!
//! Fetches the full listing on every tick and diffs it against the
//! retained baseline. The first successful fetch only establishes the
//! baseline; no alerts are raised for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::info;

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{AlertMessage, SnapshotDiffer, TickError};
use crate::ports::ListingSource;
use crate::usecases::monitor::Watcher;

/// `Watcher` for new exchange listings.
pub struct ListingWatcher {
  source: Arc<dyn ListingSource>,
  differ: SnapshotDiffer,
  label: String,
  destination: String,
  /// Minimum gap between unchanged-count summary lines.
  summary_every: Duration,
  last_summary: Option<(Instant, usize)>,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl ListingWatcher {
  /// Create a watcher; `summary_every` bounds how often an unchanged
  /// entry count is logged.
  pub fn new(
    source: Arc<dyn ListingSource>,
    differ: SnapshotDiffer,
    label: impl Into<String>,
    destination: impl Into<String>,
    summary_every: Duration,
  ) -> Self {
    Self {
      source,
      differ,
      label: label.into(),
      destination: destination.into(),
      summary_every,
      last_summary: None,
      metrics: None,
    }
  }

  /// Attach Prometheus metrics.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Borrow the snapshot differ.
  pub fn differ(&self) -> &SnapshotDiffer {
    &self.differ
  }

  /// Log the entry count when it changes or the summary interval lapses.
  fn summarize(&mut self, count: usize) {
    let now = Instant::now();
    let due = match self.last_summary {
      None => true,
      Some((at, last)) => last != count || now.duration_since(at) >= self.summary_every,
    };
    if due {
      info!(
        entries = count,
        baseline = self.differ.baseline().map(|b| b.len()),
        "Listing snapshot"
      );
      self.last_summary = Some((now, count));
    }
  }
}

#[async_trait]
impl Watcher for ListingWatcher {
  fn name(&self) -> &'static str {
    "listings"
  }

  async fn tick(&mut self) -> Result<Vec<AlertMessage>, TickError> {
    let snapshot = self.source.fetch().await?;
    let count = snapshot.len();
    if let Some(metrics) = &self.metrics {
      metrics.snapshot_size.set(count as i64);
    }

    let first = self.differ.baseline().is_none();
    let fresh = self.differ.observe(snapshot)?;
    if first {
      info!(entries = count, "Listing baseline established");
    }
    self.summarize(count);

    Ok(
      fresh
        .iter()
        .map(|record| {
          info!(
            symbol = %record.symbol,
            name = record.name.as_deref().unwrap_or("-"),
            chain_id = record.chain_id.as_deref().unwrap_or("-"),
            contract = record.contract_address.as_deref().unwrap_or("-"),
            "New listing"
          );
          AlertMessage::listing_added(record, &self.label, &self.destination)
        })
        .collect(),
    )
  }
}
