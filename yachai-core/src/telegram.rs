//! Telegram Bot API client and the escalation [`Notifier`].
//!
//! `TelegramClient` wraps the two Bot API methods Yachai uses: `sendMessage`
//! for alerts and replies, `getUpdates` for the optional listener.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{TelegramConfig, PLACEHOLDER_BOT_TOKEN, PLACEHOLDER_CHAT_ID};

const TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Telegram is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Telegram API error ({code}): {message}")]
    Api { code: u16, message: String },
}

// Method URLs embed the bot token; strip it before the error can be logged.
impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Http(e.without_url())
    }
}

/// Delivers a formatted alert to the fixed escalation channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `Ok(())` means the transport acknowledged delivery.
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

fn is_unset(value: &str, placeholder: &str) -> bool {
    value.trim().is_empty() || value == placeholder
}

// ============================================================================
// Bot API structs
// ============================================================================

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

// ============================================================================
// TelegramClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    bot_token: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str, timeout: Duration) -> Result<Self, NotifyError> {
        Self::with_base_url(bot_token, timeout, TELEGRAM_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        bot_token: &str,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bot_token: bot_token.to_string(),
            base_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        !is_unset(&self.bot_token, PLACEHOLDER_BOT_TOKEN)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), NotifyError> {
        if !self.is_configured() {
            return Err(NotifyError::NotConfigured);
        }

        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
        };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.description.map(|d| (e.error_code.unwrap_or(status.as_u16()), d)))
                .unwrap_or((status.as_u16(), body));
            return Err(NotifyError::Api { code, message });
        }
        Ok(())
    }

    /// Long-poll for updates after `offset`. `timeout` is the server-side wait.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, NotifyError> {
        if !self.is_configured() {
            return Err(NotifyError::NotConfigured);
        }

        let mut query = vec![("timeout", timeout.as_secs().to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            // the HTTP timeout must outlast the long poll
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiEnvelope<Vec<Update>> = response.json().await?;
        if !envelope.ok {
            return Err(NotifyError::Api {
                code: envelope.error_code.unwrap_or(status.as_u16()),
                message: envelope.description.unwrap_or_default(),
            });
        }
        Ok(envelope.result.unwrap_or_default())
    }
}

// ============================================================================
// TelegramNotifier
// ============================================================================

/// Sends HTML-formatted alerts to the configured destination chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = TelegramClient::new(
            &config.bot_token,
            Duration::from_secs(config.timeout_seconds),
        )?;
        Ok(Self::new(client, config.chat_id.clone()))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured() && !is_unset(&self.chat_id, PLACEHOLDER_CHAT_ID)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        if !self.is_configured() {
            tracing::warn!("Telegram alert skipped: bot token or chat id not configured");
            return Err(NotifyError::NotConfigured);
        }

        match self.client.send_message(&self.chat_id, message, Some("HTML")).await {
            Ok(()) => {
                tracing::info!("Escalation alert delivered");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Escalation alert failed");
                Err(e)
            }
        }
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: &str) -> TelegramClient {
        TelegramClient::with_base_url(token, Duration::from_secs(5), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_html_message_to_chat() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "-100123",
                "text": "<b>alert</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "result": { "message_id": 1 }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = TelegramNotifier::new(client(&mock_server, "test-token"), "-100123");
        assert!(notifier.send("<b>alert</b>").await.is_ok());
    }

    #[tokio::test]
    async fn test_placeholder_config_short_circuits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let placeholder_chat =
            TelegramNotifier::new(client(&mock_server, "test-token"), PLACEHOLDER_CHAT_ID);
        assert!(matches!(
            placeholder_chat.send("x").await,
            Err(NotifyError::NotConfigured)
        ));

        let placeholder_token =
            TelegramNotifier::new(client(&mock_server, PLACEHOLDER_BOT_TOKEN), "-100123");
        assert!(matches!(
            placeholder_token.send("x").await,
            Err(NotifyError::NotConfigured)
        ));

        let empty = TelegramNotifier::new(client(&mock_server, ""), "");
        assert!(!empty.is_configured());
    }

    #[tokio::test]
    async fn test_api_rejection_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
            })))
            .mount(&mock_server)
            .await;

        let notifier = TelegramNotifier::new(client(&mock_server, "test-token"), "-1");
        match notifier.send("x").await {
            Err(NotifyError::Api { code, message }) => {
                assert_eq!(code, 400);
                assert!(message.contains("chat not found"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_updates_parses_text_messages() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .and(query_param("offset", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    { "update_id": 11, "message": { "message_id": 5, "chat": { "id": 42, "type": "private" }, "text": "দাবি" } },
                    { "update_id": 12 }
                ]
            })))
            .mount(&mock_server)
            .await;

        let updates = client(&mock_server, "test-token")
            .get_updates(Some(11), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("দাবি"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_html("সত্য"), "সত্য");
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_bot_token() {
        let client = TelegramClient::with_base_url(
            "123:SECRET-TOKEN",
            Duration::from_secs(2),
            "http://127.0.0.1:1".to_string(),
        )
        .unwrap();

        let err = client.get_updates(None, Duration::from_secs(0)).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-TOKEN"), "token leaked: {}", err);

        let notifier = TelegramNotifier::new(client, "-100123");
        let err = notifier.send("<b>alert</b>").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
        assert!(!err.to_string().contains("SECRET-TOKEN"), "token leaked: {}", err);
    }
}
