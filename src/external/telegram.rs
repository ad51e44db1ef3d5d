use reqwest::Client;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::subscriber_queries;
use crate::errors::AppError;

/// Telegram Bot API notifier. Messages use HTML parse mode. When the bot
/// token is not configured the notifier is disabled and sends become no-ops.
pub struct TelegramNotifier {
    client: Client,
    token: Option<String>,
    admin_chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn from_env() -> Self {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty());
        let admin_chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty());

        if token.is_none() {
            warn!("TELEGRAM_BOT_TOKEN not set; Telegram alerts disabled");
        }

        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token,
            admin_chat_id,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some() && self.admin_chat_id.is_some()
    }

    /// Sends to the admin chat only.
    pub async fn send(&self, text: &str) -> Result<(), AppError> {
        let Some(chat_id) = self.admin_chat_id.clone() else {
            info!("Telegram disabled; dropping message ({} chars)", text.len());
            return Ok(());
        };
        self.send_to(&chat_id, text).await
    }

    /// Sends to the admin chat plus every approved subscriber. Per-chat
    /// failures are logged and skipped rather than aborting the broadcast.
    pub async fn broadcast(&self, pool: &PgPool, text: &str) -> Result<usize, AppError> {
        if !self.is_enabled() {
            info!("Telegram disabled; dropping broadcast ({} chars)", text.len());
            return Ok(0);
        }

        let mut chat_ids = vec![];
        if let Some(admin) = &self.admin_chat_id {
            chat_ids.push(admin.clone());
        }
        match subscriber_queries::approved_chat_ids(pool).await {
            Ok(ids) => chat_ids.extend(ids),
            Err(e) => warn!("Could not fetch subscriber chat ids: {}", e),
        }
        chat_ids.sort();
        chat_ids.dedup();

        let mut delivered = 0;
        for chat_id in chat_ids {
            match self.send_to(&chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to send to chat {}: {}", chat_id, e),
            }
        }

        info!("Broadcast delivered to {} chats", delivered);
        Ok(delivered)
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<(), AppError> {
        let Some(token) = &self.token else {
            return Ok(());
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|e| AppError::External(format!("Telegram send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Telegram returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
