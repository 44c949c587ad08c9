//! Notification Adapters
//!
//! - `TelegramNotifier`: bot API webhook with rate limiting
//! - `LogNotifier`: used when no credentials are configured; alerts are
//!   already logged by the monitor, so delivery is a no-op

pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::NotifierConfig;
use crate::domain::{AlertMessage, NotifyError};
use crate::ports::Notifier;

pub use telegram::TelegramNotifier;

/// Notifier that only records the alert at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &AlertMessage) -> Result<(), NotifyError> {
        debug!(kind = alert.kind.label(), "No alert sink configured, alert logged only");
        Ok(())
    }
}

/// Pick the notifier from config: Telegram when credentials exist.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match config.credentials() {
        Some((token, _chat)) => {
            info!(api = %config.api_base, "Telegram alerts enabled");
            Ok(Arc::new(TelegramNotifier::new(config, token)?))
        }
        None => {
            info!("bot_token/chat_id not set, alerts will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
