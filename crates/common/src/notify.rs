use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// Delivery channel for monitor alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Writes alerts to the log. Used when no messaging channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(%message, "Alert");
        Ok(())
    }
}
