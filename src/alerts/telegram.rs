use super::{format, AlertChannel, AlertError};
use crate::models::SignalRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram bot channel using the `sendMessage` method
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send raw text to the configured chat
    pub async fn send_text(&self, text: &str) -> Result<(), AlertError> {
        if self.bot_token.is_empty() {
            return Err(AlertError::NotConfigured {
                channel: "telegram",
                missing: "TELEGRAM_BOT_TOKEN",
            });
        }
        if self.chat_id.is_empty() {
            return Err(AlertError::NotConfigured {
                channel: "telegram",
                missing: "TELEGRAM_CHAT_ID",
            });
        }

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => {
                tracing::debug!(chat_id = %self.chat_id, "Telegram message delivered");
                Ok(())
            }
            other => Err(AlertError::Rejected {
                channel: "telegram",
                status,
                detail: other
                    .and_then(|b| b.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, record: &SignalRecord) -> Result<(), AlertError> {
        self.send_text(&format::telegram_message(record)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_posts_formatted_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN123/sendMessage")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "chat_id": "-1001" })),
                Matcher::Regex("MARUTI.NS".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":7}}"#)
            .create_async()
            .await;

        let channel = TelegramChannel::new("TOKEN123", "-1001").with_base_url(server.url());
        channel.send(&format::sample_record()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN123/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let channel = TelegramChannel::new("TOKEN123", "42").with_base_url(server.url());
        let err = channel.send_text("hello").await.unwrap_err();

        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let channel = TelegramChannel::new("", "42").with_base_url("http://127.0.0.1:9");
        let err = channel.send_text("hello").await.unwrap_err();

        assert!(matches!(
            err,
            AlertError::NotConfigured {
                missing: "TELEGRAM_BOT_TOKEN",
                ..
            }
        ));
    }
}
