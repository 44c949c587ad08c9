//! Error taxonomy shared by both monitors.
//!
//! Each operation returns its own typed error; only the boundary that
//! must act on a failure sees it:
//! - `ConnectionError` → backoff + fresh connection attempt
//! - `FilterError::Unsupported` / `Expired` → FILTER→POLL downgrade
//! - `FetchError` → backoff, loop continues
//! - `DecodeError` → entry skipped, loop continues
//! - `AnomalyError` → fatal (or suppressed, per policy)
//! - `NotifyError` → always swallowed by the monitor

use std::time::Duration;

use alloy::primitives::B256;
use thiserror::Error;

/// Failure to open (or re-open) an upstream RPC connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
  /// Endpoint could not be reached (DNS, TCP, TLS, handshake).
  #[error("endpoint unreachable: {0}")]
  Unreachable(String),
  /// Connect or liveness check exceeded its deadline.
  #[error("connection timed out after {0:?}")]
  Timeout(Duration),
  /// Upstream answered but refused the session.
  #[error("upstream rejected connection: {0}")]
  Rejected(String),
}

/// Transient failure of a single fetch (RPC call or HTTP GET).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Request exceeded its deadline.
  #[error("request timed out after {0:?}")]
  Timeout(Duration),
  /// Transport-level failure (connection reset, RPC error response).
  #[error("transport error: {0}")]
  Transport(String),
  /// Non-success HTTP status.
  #[error("http status {0}")]
  Status(u16),
  /// Response body could not be interpreted.
  #[error("malformed response: {0}")]
  Malformed(String),
}

/// Failure of a server-side filter operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
  /// Upstream refuses to register log filters.
  #[error("server-side filters unsupported: {0}")]
  Unsupported(String),
  /// Filter id no longer known to the upstream.
  #[error("filter expired or unknown")]
  Expired,
  /// Any other transient failure.
  #[error(transparent)]
  Fetch(#[from] FetchError),
}

/// A single raw log entry that does not match the expected event schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
  /// Log carries no topic0.
  #[error("log has no event signature topic")]
  MissingSignature,
  /// topic0 belongs to a different event.
  #[error("unexpected event signature {found}")]
  SignatureMismatch {
    /// Observed topic0.
    found: B256,
  },
  /// Topics/data do not decode as the expected field types.
  #[error("abi decode failed: {0}")]
  Abi(String),
  /// Pending or pruned log without block/tx metadata.
  #[error("log is missing {0}")]
  MissingMetadata(&'static str),
}

/// Listing diff larger than the configured safety threshold.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{count} new listings in one tick exceeds threshold {threshold}: {symbols:?}")]
pub struct AnomalyError {
  /// Size of the raw diff.
  pub count: usize,
  /// Configured maximum.
  pub threshold: usize,
  /// The offending symbols (sorted).
  pub symbols: Vec<String>,
}

/// Alert delivery failure. Never propagated past the monitor loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
  /// Webhook did not answer within the bound.
  #[error("notification timed out after {0:?}")]
  Timeout(Duration),
  /// Local rate limit could not be satisfied within the bound.
  #[error("notification rate limit exhausted")]
  RateLimited,
  /// Webhook answered with a non-success status.
  #[error("webhook returned status {0}")]
  Status(u16),
  /// Transport-level failure.
  #[error("webhook transport error: {0}")]
  Transport(String),
}

/// Outcome of a failed monitor tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TickError {
  #[error(transparent)]
  Connection(#[from] ConnectionError),
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error(transparent)]
  Anomaly(#[from] AnomalyError),
}

/// Fatal condition that terminates a monitor loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
  #[error("{monitor} monitor aborted: {source}")]
  Anomaly {
    /// Monitor name.
    monitor: &'static str,
    /// Triggering anomaly.
    source: AnomalyError,
  },
}
