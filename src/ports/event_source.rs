//! Event Source Port - Contract Log Read Interface
//!
//! Defines the traits for reading contract logs from an upstream RPC:
//! server-side filters (register + incremental changes) and manual
//! block-range queries. `Connector` is the Connection Manager seam: it
//! hands out a fresh, exclusively-owned source and never repairs one.

use std::ops::RangeInclusive;
use std::sync::Arc;

use alloy::rpc::types::Log;
use async_trait::async_trait;

use crate::domain::{ConnectionError, FetchError, FilterError, FilterId, LogQuery};

/// How the upstream connection is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
  /// Persistent stream (WebSocket).
  Stream,
  /// Request/response (HTTP).
  RequestResponse,
}

impl TransportKind {
  /// Short label for logs.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Stream => "stream",
      Self::RequestResponse => "request-response",
    }
  }
}

/// One live upstream connection.
///
/// Implementors do not apply their own deadlines to filter calls; the
/// filter controller bounds every call it makes.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
  /// Transport this source runs over.
  fn transport(&self) -> TransportKind;

  /// Current chain head.
  async fn head(&self) -> Result<u64, FetchError>;

  /// Register a server-side log filter starting at `from_block`.
  async fn install_filter(
    &self,
    query: &LogQuery,
    from_block: u64,
  ) -> Result<FilterId, FilterError>;

  /// Logs accumulated on `id` since the previous call.
  async fn filter_changes(&self, id: FilterId) -> Result<Vec<Log>, FilterError>;

  /// Drop a filter this session no longer reads. `Ok(false)` means the
  /// upstream had already forgotten it.
  async fn uninstall_filter(&self, id: FilterId) -> Result<bool, FilterError>;

  /// Manual query over an inclusive block range.
  async fn logs_in_range(
    &self,
    query: &LogQuery,
    range: RangeInclusive<u64>,
  ) -> Result<Vec<Log>, FetchError>;

  /// Lightweight liveness check.
  async fn is_live(&self) -> bool;
}

/// Connection Manager: opens fresh upstream connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
  /// Open a new connection, replacing nothing.
  async fn connect(&self) -> Result<Arc<dyn EventSource>, ConnectionError>;
}
