//! Command-line / environment overrides.
//!
//! Precedence: explicit flag > environment variable (including `.env`)
//! > config file > built-in default. clap resolves the first two; the
//! result is layered over the file config by `apply`.

use std::path::PathBuf;

use clap::Parser;

use super::AppConfig;
use crate::domain::BlockStart;

/// Watch an AddToken event stream and an exchange listing for new assets.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "listing-sentinel", version, about)]
pub struct Overrides {
  /// Path to the TOML config file.
  #[arg(long, short = 'c', env = "SENTINEL_CONFIG")]
  pub config: Option<PathBuf>,

  /// WebSocket RPC endpoint (takes precedence over HTTP).
  #[arg(long, env = "RPC_WSS")]
  pub rpc_wss: Option<String>,

  /// HTTP RPC endpoint.
  #[arg(long, env = "RPC_HTTP")]
  pub rpc_http: Option<String>,

  /// First block to watch: `latest` or a block number.
  #[arg(long)]
  pub from_block: Option<BlockStart>,

  /// Only match this price feed address.
  #[arg(long)]
  pub pricefeed: Option<String>,

  /// Event monitor tick interval in seconds.
  #[arg(long)]
  pub poll_interval: Option<f64>,

  /// Listing endpoint.
  #[arg(long, env = "BN_ALPHA_URL")]
  pub listing_url: Option<String>,

  /// Listing monitor tick interval in seconds.
  #[arg(long, env = "POLL_INTERVAL")]
  pub listing_interval: Option<f64>,

  /// Alert bot token.
  #[arg(long, env = "bot_token", hide_env_values = true)]
  pub bot_token: Option<String>,

  /// Alert chat id.
  #[arg(long, env = "chat_id")]
  pub chat_id: Option<String>,

  /// Run only the event monitor.
  #[arg(long, conflicts_with = "listing_only")]
  pub events_only: bool,

  /// Run only the listing monitor.
  #[arg(long)]
  pub listing_only: bool,
}

impl Overrides {
  /// Layer the overrides onto a file-loaded config.
  pub fn apply(&self, config: &mut AppConfig) {
    if let Some(wss) = &self.rpc_wss {
      config.rpc.ws_url = Some(wss.clone());
    }
    if let Some(http) = &self.rpc_http {
      config.rpc.http_url.clone_from(http);
    }
    if let Some(start) = self.from_block {
      config.event_monitor.from_block = start;
    }
    if let Some(feed) = &self.pricefeed {
      config.event_monitor.price_feed = Some(feed.clone());
    }
    if let Some(secs) = self.poll_interval {
      config.event_monitor.poll_interval_ms = Some(secs_to_ms(secs));
    }
    if let Some(url) = &self.listing_url {
      config.listing_monitor.url.clone_from(url);
    }
    if let Some(secs) = self.listing_interval {
      config.listing_monitor.poll_interval_ms = secs_to_ms(secs);
    }
    if let Some(token) = &self.bot_token {
      config.notifier.bot_token = Some(token.clone());
    }
    if let Some(chat) = &self.chat_id {
      config.notifier.chat_id = Some(chat.clone());
    }
    if self.events_only {
      config.listing_monitor.enabled = false;
    }
    if self.listing_only {
      config.event_monitor.enabled = false;
    }
  }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn secs_to_ms(secs: f64) -> u64 {
  (secs.max(0.0) * 1000.0).round() as u64
}
