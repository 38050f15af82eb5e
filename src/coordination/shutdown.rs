//! Shutdown signalling
//!
//! One `watch` channel fans the stop request out to the decision loop and
//! the quote feed. Each task finishes its current unit of work (for the
//! loop, the tick and its writes) before returning.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct ShutdownController {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trigger shutdown on Ctrl-C
    pub fn listen_for_ctrl_c(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current tick");
                    controller.trigger();
                }
                Err(e) => error!("failed to listen for Ctrl-C: {}", e),
            }
        });
    }
}
