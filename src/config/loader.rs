//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying overrides, validating all
//! parameters, and providing clear error messages for misconfiguration.
//! Any error here is fatal at startup.

use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use super::overrides::Overrides;

/// Default config location, optional.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;
  validate_config(&config)?;
  Ok(config)
}

/// Parse TOML text into a config (no validation).
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Resolve the final config: file (or defaults) + overrides, validated.
///
/// An explicitly named file must exist; the default `config.toml` is
/// optional.
pub fn resolve(overrides: &Overrides) -> Result<AppConfig> {
  let mut config = match &overrides.config {
    Some(path) => {
      let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
      parse_config(&content)?
    }
    None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
      let content = std::fs::read_to_string(DEFAULT_CONFIG_PATH)
        .with_context(|| format!("Failed to read config file: {DEFAULT_CONFIG_PATH}"))?;
      parse_config(&content)?
    }
    None => AppConfig::default(),
  };

  overrides.apply(&mut config);
  validate_config(&config)?;

  info!(
    events = config.event_monitor.enabled,
    listings = config.listing_monitor.enabled,
    stream = config.rpc.prefers_stream(),
    from_block = %config.event_monitor.from_block,
    alerts = config.notifier.credentials().is_some(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - At least one monitor enabled
/// - Parseable contract / price-feed addresses
/// - Non-empty endpoints
/// - Positive intervals and timeouts
/// - Sensible backoff bounds
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    config.event_monitor.enabled || config.listing_monitor.enabled,
    "At least one monitor must be enabled"
  );

  if config.event_monitor.enabled {
    let ev = &config.event_monitor;
    ev.contract
      .parse::<Address>()
      .with_context(|| format!("Invalid event_monitor.contract '{}'", ev.contract))?;
    if let Some(feed) = ev.price_feed.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
      feed
        .parse::<Address>()
        .with_context(|| format!("Invalid event_monitor.price_feed '{feed}'"))?;
    }
    anyhow::ensure!(
      config.rpc.prefers_stream() || !config.rpc.http_url.trim().is_empty(),
      "Either rpc.ws_url or rpc.http_url must be set"
    );
    anyhow::ensure!(
      ev.poll_interval_ms.map_or(true, |ms| ms > 0),
      "event_monitor.poll_interval_ms must be positive"
    );
    anyhow::ensure!(ev.max_poll_span > 0, "event_monitor.max_poll_span must be positive");
    anyhow::ensure!(
      ev.probe_timeout_ms > 0,
      "event_monitor.probe_timeout_ms must be positive"
    );
    anyhow::ensure!(
      config.rpc.request_timeout_ms > 0 && config.rpc.connect_timeout_ms > 0,
      "rpc timeouts must be positive"
    );
  }

  if config.listing_monitor.enabled {
    let lm = &config.listing_monitor;
    anyhow::ensure!(!lm.url.trim().is_empty(), "listing_monitor.url must not be empty");
    anyhow::ensure!(
      lm.poll_interval_ms > 0,
      "listing_monitor.poll_interval_ms must be positive"
    );
    anyhow::ensure!(
      lm.request_timeout_ms > 0,
      "listing_monitor.request_timeout_ms must be positive"
    );
  }

  anyhow::ensure!(config.backoff.base_ms > 0, "backoff.base_ms must be positive");
  anyhow::ensure!(
    config.backoff.base_ms <= config.backoff.max_ms,
    "backoff.base_ms ({}) must not exceed backoff.max_ms ({})",
    config.backoff.base_ms,
    config.backoff.max_ms
  );
  anyhow::ensure!(config.notifier.timeout_ms > 0, "notifier.timeout_ms must be positive");

  Ok(())
}
