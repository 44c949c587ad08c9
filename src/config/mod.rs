//! Configuration Module - TOML-based Monitor Configuration
//!
//! Loads and validates configuration from `config.toml`, then applies
//! `.env` / environment / command-line overrides (see `overrides`).
//! Every section has defaults so the sentinel runs without a file.
//! The contract address and listing URL are externalized here - nothing
//! is hardcoded in the usecases layer.

pub mod loader;
pub mod overrides;

pub use overrides::Overrides;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::{AnomalyPolicy, BlockStart};

/// Top-level sentinel configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Process identity and logging.
  pub bot: BotConfig,
  /// Upstream RPC endpoints.
  pub rpc: RpcConfig,
  /// On-chain AddToken monitor.
  pub event_monitor: EventMonitorConfig,
  /// Exchange listing monitor.
  pub listing_monitor: ListingMonitorConfig,
  /// Shared backoff parameters.
  pub backoff: BackoffConfig,
  /// Alert webhook.
  pub notifier: NotifierConfig,
  /// Metrics and health endpoints.
  pub metrics: MetricsConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
  /// Human-readable name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
}

impl Default for BotConfig {
  fn default() -> Self {
    Self {
      name: "listing-sentinel".to_string(),
      log_level: default_log_level(),
    }
  }
}

/// Upstream RPC configuration.
///
/// A non-empty `ws_url` selects the stream transport; otherwise
/// `http_url` is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
  /// WebSocket endpoint (preferred).
  pub ws_url: Option<String>,
  /// HTTP endpoint (fallback).
  pub http_url: String,
  /// Connect + liveness deadline (milliseconds).
  pub connect_timeout_ms: u64,
  /// Per-request deadline (milliseconds).
  pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
  fn default() -> Self {
    Self {
      ws_url: None,
      http_url: "https://bsc-dataseed.binance.org".to_string(),
      connect_timeout_ms: 10_000,
      request_timeout_ms: 5_000,
    }
  }
}

impl RpcConfig {
  /// Whether the stream transport will be used.
  pub fn prefers_stream(&self) -> bool {
    self.ws_url.as_deref().is_some_and(|u| !u.trim().is_empty())
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }
}

/// AddToken event monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventMonitorConfig {
  /// Run this monitor.
  pub enabled: bool,
  /// Contract emitting `AddToken`.
  pub contract: String,
  /// First block to watch.
  pub from_block: BlockStart,
  /// Only alert for this price feed (topic 2).
  pub price_feed: Option<String>,
  /// Tick interval; defaults by transport (1000 HTTP, 50 WS).
  pub poll_interval_ms: Option<u64>,
  /// Deadline for filter registration and the first probe fetch.
  pub probe_timeout_ms: u64,
  /// Widest block window per POLL tick.
  pub max_poll_span: u64,
  /// Alert title.
  pub label: String,
}

impl Default for EventMonitorConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      contract: "0x128463a60784c4d3f46c23af3f65ed859ba87974".to_string(),
      from_block: BlockStart::Latest,
      price_feed: None,
      poll_interval_ms: None,
      probe_timeout_ms: 3_000,
      max_poll_span: crate::domain::filter::DEFAULT_MAX_POLL_SPAN,
      label: "Aster AddToken event".to_string(),
    }
  }
}

impl EventMonitorConfig {
  /// Effective tick interval for the selected transport.
  pub fn poll_interval(&self, stream: bool) -> Duration {
    let ms = self
      .poll_interval_ms
      .unwrap_or(if stream { 50 } else { 1_000 });
    Duration::from_millis(ms)
  }

  pub fn probe_timeout(&self) -> Duration {
    Duration::from_millis(self.probe_timeout_ms)
  }
}

/// Listing snapshot monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingMonitorConfig {
  /// Run this monitor.
  pub enabled: bool,
  /// Listing endpoint returning `{"data": [...]}`.
  pub url: String,
  /// Tick interval (milliseconds).
  pub poll_interval_ms: u64,
  /// GET deadline (milliseconds).
  pub request_timeout_ms: u64,
  /// Largest tolerated number of new symbols per tick.
  pub anomaly_threshold: usize,
  /// Reaction to an oversized diff.
  pub anomaly_policy: AnomalyPolicy,
  /// Captures larger than this replace the baseline.
  pub baseline_replace_above: usize,
  /// Emit a size summary at least this often (seconds).
  pub summary_interval_secs: u64,
  /// Alert title.
  pub label: String,
}

impl Default for ListingMonitorConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      url: "https://www.binance.com/bapi/defi/v1/public/wallet-direct/buw/wallet/cex/alpha/all/token/list"
        .to_string(),
      poll_interval_ms: 150,
      request_timeout_ms: 5_000,
      anomaly_threshold: crate::domain::listing::DEFAULT_ANOMALY_THRESHOLD,
      anomaly_policy: AnomalyPolicy::Abort,
      baseline_replace_above: crate::domain::listing::DEFAULT_BASELINE_REPLACE_ABOVE,
      summary_interval_secs: 10,
      label: "Binance Alpha new listing".to_string(),
    }
  }
}

impl ListingMonitorConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }

  pub fn summary_interval(&self) -> Duration {
    Duration::from_secs(self.summary_interval_secs)
  }
}

/// Backoff parameters shared by both monitors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
  /// First retry delay (milliseconds).
  pub base_ms: u64,
  /// Delay cap (milliseconds).
  pub max_ms: u64,
}

impl Default for BackoffConfig {
  fn default() -> Self {
    Self {
      base_ms: 1_000,
      max_ms: 30_000,
    }
  }
}

impl BackoffConfig {
  /// Fresh controller from these parameters.
  pub fn build(&self) -> crate::domain::Backoff {
    crate::domain::Backoff::new(
      Duration::from_millis(self.base_ms),
      Duration::from_millis(self.max_ms),
    )
  }
}

/// Telegram-style webhook configuration.
///
/// Credentials normally come from the environment (`bot_token`,
/// `chat_id`) rather than the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
  /// Bot API base URL.
  pub api_base: String,
  /// Bot token; alerts are only logged when unset.
  pub bot_token: Option<String>,
  /// Destination chat id.
  pub chat_id: Option<String>,
  /// Delivery deadline (milliseconds).
  pub timeout_ms: u64,
  /// Formatting hint sent with each message.
  pub parse_mode: String,
  /// Local rate limit.
  pub max_per_minute: u32,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self {
      api_base: "https://api.telegram.org".to_string(),
      bot_token: None,
      chat_id: None,
      timeout_ms: 5_000,
      parse_mode: "Markdown".to_string(),
      max_per_minute: 20,
    }
  }
}

impl NotifierConfig {
  /// Token and chat id, when both are present and non-empty.
  pub fn credentials(&self) -> Option<(&str, &str)> {
    let token = self.bot_token.as_deref().filter(|t| !t.is_empty())?;
    let chat = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
    Some((token, chat))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

/// Metrics and health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Serve `/metrics`, `/live`, `/ready`.
  pub enabled: bool,
  /// Bind address.
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9090".to_string(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}
