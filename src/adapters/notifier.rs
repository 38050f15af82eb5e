//! Push notifications
//!
//! Sends are fire-and-forget: failures are logged and reported as `false`,
//! never raised into the decision loop.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::telegram::TelegramNotifier;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message; `true` if it was accepted
    async fn send(&self, message: &str) -> bool;
}

/// Sink that only writes to the diagnostics log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, message: &str) -> bool {
        info!(target: "niftygear::notify", "{message}");
        true
    }
}

/// Telegram when its credentials are in the environment, otherwise log only
pub fn notifier_from_env() -> Arc<dyn NotificationSink> {
    match TelegramNotifier::from_env() {
        Some(telegram) => telegram,
        None => Arc::new(LogNotifier),
    }
}

/// Spawn a send so the caller never waits on the transport
pub fn notify_detached(sink: &Arc<dyn NotificationSink>, message: String) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        sink.send(&message).await;
    });
}
