//! Notifier Port - Alert Delivery Interface

use async_trait::async_trait;

use crate::domain::{AlertMessage, NotifyError};

/// Best-effort alert sink.
///
/// Implementations must return within their own time bound. Callers
/// log and drop any error so delivery outages never stall monitoring.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  /// Deliver one alert to `alert.destination`.
  async fn notify(&self, alert: &AlertMessage) -> Result<(), NotifyError>;
}
