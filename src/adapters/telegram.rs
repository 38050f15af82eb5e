//! Telegram Bot API notifications
//!
//! Enabled by `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::notifier::NotificationSink;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    /// Create a notifier from environment variables
    pub fn from_env() -> Option<Arc<Self>> {
        let token = std::env::var("TELEGRAM_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return None;
        }
        info!("Telegram notifications enabled");
        Some(Self::new(token, chat_id))
    }

    pub fn new(token: String, chat_id: String) -> Arc<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Arc::new(Self {
            client,
            token,
            chat_id,
        })
    }

    /// Send a text message to the configured chat
    pub async fn send_message(&self, text: &str) -> Result<(), String> {
        let url = format!("{API_BASE}/bot{}/sendMessage", self.token);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
        };

        match self.client.post(&url).json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Telegram notification sent");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Telegram notification failed: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                // the token is part of the URL, keep it out of the log
                let e = e.without_url();
                error!("Telegram request failed: {}", e);
                Err(e.to_string())
            }
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, message: &str) -> bool {
        self.send_message(message).await.is_ok()
    }
}
