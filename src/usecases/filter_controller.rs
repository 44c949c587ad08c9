//! Event Filter Controller - PROBE / FILTER / POLL State Machine
//!
//! Decides, per tick, how contract logs are fetched from one upstream
//! session:
//! 1. PROBE: register a server-side filter and read it once, both under
//!    the probe deadline
//! 2. FILTER: read incremental changes from the registered filter
//! 3. POLL: manual `getLogs` over `[cursor, head]`, clamped to the
//!    newest `max_span + 1` blocks
//!
//! Rejection, expiry or a probe deadline miss moves the controller to
//! POLL for the rest of the session. A filter abandoned while the upstream
//! still holds it is uninstalled first. Only `reset_session` (called on
//! reconnect) re-enters PROBE. The cursor survives resets.

use std::future::Future;
use std::time::Duration;

use alloy::rpc::types::Log;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::filter::poll_window;
use crate::domain::{
  BlockStart, Cursor, FetchError, FilterError, FilterId, FilterMode, LogQuery,
};
use crate::ports::EventSource;

/// Deadlines and window limits for the controller.
#[derive(Debug, Clone, Copy)]
pub struct FilterTimings {
  /// Bound on filter registration and the first read during PROBE.
  pub probe_timeout: Duration,
  /// Bound on every other upstream call.
  pub request_timeout: Duration,
  /// Widest block span queried per POLL tick.
  pub max_span: u64,
}

/// Per-session filter state machine.
#[derive(Debug)]
pub struct EventFilterController {
  query: LogQuery,
  start: BlockStart,
  mode: FilterMode,
  cursor: Cursor,
  timings: FilterTimings,
}

impl EventFilterController {
  /// Create a controller in PROBE mode with an unseeded cursor.
  pub fn new(query: LogQuery, start: BlockStart, timings: FilterTimings) -> Self {
    Self {
      query,
      start,
      mode: FilterMode::Probe,
      cursor: Cursor::default(),
      timings,
    }
  }

  /// Current mode.
  pub fn mode(&self) -> FilterMode {
    self.mode
  }

  /// Next block POLL mode will query, once known.
  pub fn cursor(&self) -> Option<u64> {
    self.cursor.get()
  }

  /// Query being watched.
  pub fn query(&self) -> &LogQuery {
    &self.query
  }

  /// Start a new upstream session: back to PROBE, cursor kept.
  pub fn reset_session(&mut self) {
    if self.mode != FilterMode::Probe {
      debug!(from = self.mode.label(), "Session reset, re-entering probe");
    }
    self.mode = FilterMode::Probe;
  }

  /// Fetch the logs for one tick.
  pub async fn fetch(&mut self, source: &dyn EventSource) -> Result<Vec<Log>, FetchError> {
    match self.mode {
      FilterMode::Probe => self.probe(source).await,
      FilterMode::Filter(id) => self.changes(source, id).await,
      FilterMode::Poll => self.poll(source).await,
    }
  }

  async fn probe(&mut self, source: &dyn EventSource) -> Result<Vec<Log>, FetchError> {
    let from_block = self.session_start(source).await?;
    let probe_timeout = self.timings.probe_timeout;

    let id = match bounded(probe_timeout, source.install_filter(&self.query, from_block)).await {
      Ok(id) => id,
      Err(FilterError::Fetch(FetchError::Timeout(elapsed))) => {
        return self
          .downgrade(source, &format!("filter registration timed out after {elapsed:?}"))
          .await;
      }
      Err(FilterError::Fetch(e)) => return Err(e),
      Err(e) => return self.downgrade(source, &e.to_string()).await,
    };

    match bounded(probe_timeout, source.filter_changes(id)).await {
      Ok(logs) => {
        info!(
          filter_id = %id,
          from_block,
          transport = source.transport().label(),
          "Server-side filter active"
        );
        self.mode = FilterMode::Filter(id);
        self.track(&logs);
        Ok(logs)
      }
      Err(FilterError::Fetch(FetchError::Timeout(elapsed))) => {
        self.release(source, id).await;
        self
          .downgrade(source, &format!("filter probe timed out after {elapsed:?}"))
          .await
      }
      Err(FilterError::Fetch(e)) => {
        self.release(source, id).await;
        Err(e)
      }
      Err(e) => {
        self.release(source, id).await;
        self.downgrade(source, &e.to_string()).await
      }
    }
  }

  async fn changes(
    &mut self,
    source: &dyn EventSource,
    id: FilterId,
  ) -> Result<Vec<Log>, FetchError> {
    match bounded(self.timings.request_timeout, source.filter_changes(id)).await {
      Ok(logs) => {
        self.track(&logs);
        Ok(logs)
      }
      Err(FilterError::Fetch(e)) => Err(e),
      Err(e @ FilterError::Expired) => self.downgrade(source, &e.to_string()).await,
      Err(e) => {
        self.release(source, id).await;
        self.downgrade(source, &e.to_string()).await
      }
    }
  }

  /// Best-effort `uninstall` of a filter that will not be read again.
  ///
  /// Filters left behind on a dropped connection are not chased; the
  /// upstream expires idle filters on its own.
  async fn release(&self, source: &dyn EventSource, id: FilterId) {
    match bounded(self.timings.request_timeout, source.uninstall_filter(id)).await {
      Ok(removed) => debug!(filter_id = %id, removed, "Log filter released"),
      Err(e) => debug!(filter_id = %id, error = %e, "Log filter release failed"),
    }
  }

  async fn poll(&mut self, source: &dyn EventSource) -> Result<Vec<Log>, FetchError> {
    let head = bounded(self.timings.request_timeout, source.head()).await?;
    self.cursor.seed(head);
    let cursor = self.cursor.get().unwrap_or(head);

    let Some(range) = poll_window(cursor, head, self.timings.max_span) else {
      return Ok(Vec::new());
    };
    if *range.start() > cursor {
      warn!(
        cursor,
        head,
        skipped = *range.start() - cursor,
        "Poll window clamped, older blocks skipped"
      );
    }

    let logs = bounded(
      self.timings.request_timeout,
      source.logs_in_range(&self.query, range.clone()),
    )
    .await?;

    debug!(from = *range.start(), to = head, logs = logs.len(), "Polled block range");
    self.cursor.advance_to(head.saturating_add(1));
    Ok(logs)
  }

  /// Switch to POLL for the rest of the session and poll right away.
  async fn downgrade(
    &mut self,
    source: &dyn EventSource,
    reason: &str,
  ) -> Result<Vec<Log>, FetchError> {
    warn!(
      from = self.mode.label(),
      reason,
      "Server-side filter unavailable, falling back to block polling"
    );
    self.mode = FilterMode::Poll;
    self.poll(source).await
  }

  /// Block the filter should start from, seeding the cursor on first use.
  async fn session_start(&mut self, source: &dyn EventSource) -> Result<u64, FetchError> {
    if let Some(block) = self.cursor.get() {
      return Ok(block);
    }
    let block = match self.start {
      BlockStart::Number(n) => n,
      BlockStart::Latest => bounded(self.timings.request_timeout, source.head()).await?,
    };
    self.cursor.seed(block);
    Ok(block)
  }

  fn track(&mut self, logs: &[Log]) {
    if let Some(last) = logs.iter().filter_map(|log| log.block_number).max() {
      self.cursor.advance_to(last.saturating_add(1));
    }
  }
}

/// Run `fut` under `limit`, mapping a missed deadline to `FetchError::Timeout`.
async fn bounded<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
  F: Future<Output = Result<T, E>>,
  E: From<FetchError>,
{
  timeout(limit, fut)
    .await
    .map_err(|_| E::from(FetchError::Timeout(limit)))?
}
