//! Delivery of the rendered run report.

mod telegram;

use async_trait::async_trait;
use tracing::info;

pub use telegram::TelegramNotifier;

/// Pushes a finished report somewhere a human will read it.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Writes the report to the log. Used when no chat credentials are set.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        info!("Chat credentials not configured, report follows:\n{}", text);
        Ok(())
    }
}
