//! Telegram Notifier - Bot API `sendMessage` Webhook
//!
//! Posts `{chat_id, text, parse_mode}` to `{api_base}/bot{token}/sendMessage`.
//! Every delivery, including waiting on the local rate limiter, is
//! bounded by the configured timeout (5s by default).

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Serialize;
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument};

use crate::config::NotifierConfig;
use crate::domain::{AlertMessage, NotifyError};
use crate::ports::Notifier;

/// Bot API request body.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

/// Telegram bot API notifier.
pub struct TelegramNotifier {
    /// Underlying HTTP client.
    http: Client,
    /// Full `sendMessage` URL (contains the token, never logged).
    endpoint: String,
    /// Formatting hint.
    parse_mode: String,
    /// Overall delivery bound.
    timeout: Duration,
    /// Outgoing message limiter.
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl TelegramNotifier {
    /// Create a notifier for `token`.
    pub fn new(config: &NotifierConfig, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let per_minute = NonZeroU32::new(config.max_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            parse_mode: config.parse_mode.clone(),
            timeout: config.timeout(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(kind = alert.kind.label()))]
    async fn notify(&self, alert: &AlertMessage) -> Result<(), NotifyError> {
        let deadline = Instant::now() + self.timeout;

        timeout(self.timeout, self.limiter.until_ready())
            .await
            .map_err(|_| NotifyError::RateLimited)?;

        let body = SendMessage {
            chat_id: &alert.destination,
            text: alert.text(),
            parse_mode: &self.parse_mode,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let response = timeout(remaining, self.http.post(&self.endpoint).json(&body).send())
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(self.timeout)
                } else {
                    // Strip the URL: it carries the bot token.
                    NotifyError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Alert delivered");
        Ok(())
    }
}
