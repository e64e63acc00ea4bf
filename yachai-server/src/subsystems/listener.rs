//! Telegram listener: citizens submit claims by messaging the bot.
//!
//! Long-polls `getUpdates`, runs every text message through the submission
//! workflow and replies in the same chat. `/start` gets a greeting instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use yachai_core::{ClaimClassifier, ReportStore, TelegramClient};

use super::submit::{self, Submission, SubmitError};

const ERROR_PAUSE: Duration = Duration::from_secs(2);

const GREETING: &str = "👋 স্বাগতম যাচাই (Yachai) — তোমার AI Fact-Checking সহকারী!\n\n\
🔎 যেকোনো খবর / পোস্ট / দাবি পাঠাও — আমি সত্যতা বিশ্লেষণ করে দিবো।";

pub struct ListenerContext {
    pub client: TelegramClient,
    pub store: Arc<dyn ReportStore>,
    pub classifier: Option<Arc<dyn ClaimClassifier>>,
    pub max_input_length: usize,
    pub poll_timeout: Duration,
}

/// Reply text for a processed message.
pub fn format_reply(outcome: &Result<Submission, SubmitError>) -> String {
    match outcome {
        Ok(s) => format!(
            "🧠 যাচাই ফলাফল:\n\n{} ভার্ডিক্ট: {} ({}%)\nব্যাখ্যা: {}",
            s.indicator, s.result.verdict, s.result.score, s.result.justification
        ),
        Err(e) => format!("⚠️ {}", e.user_message()),
    }
}

/// Reply for one incoming text, or `None` when there is nothing to answer.
pub async fn handle_text(ctx: &ListenerContext, text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("/start") {
        return Some(GREETING.to_string());
    }

    let outcome = submit::submit_claim(
        text,
        ctx.max_input_length,
        ctx.classifier.as_deref(),
        ctx.store.as_ref(),
    )
    .await;
    Some(format_reply(&outcome))
}

/// Poll until the shutdown signal fires.
pub async fn run_listener(ctx: ListenerContext, mut shutdown: broadcast::Receiver<()>) {
    tracing::info!("Telegram listener running");
    let mut offset: Option<i64> = None;

    loop {
        let updates = tokio::select! {
            res = ctx.client.get_updates(offset, ctx.poll_timeout) => res,
            _ = shutdown.recv() => {
                tracing::info!("Shutting down Telegram listener...");
                break;
            }
        };

        let updates = match updates {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed");
                tokio::time::sleep(ERROR_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text.as_deref() else { continue };

            let Some(reply) = handle_text(&ctx, text).await else { continue };
            let chat_id = message.chat.id.to_string();
            if let Err(e) = ctx.client.send_message(&chat_id, &reply, None).await {
                tracing::error!(chat_id = %chat_id, error = %e, "Failed to send reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::submit::tests::{FakeClassifier, RAW_FALSE};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yachai_core::JsonlReportStore;

    async fn context(
        server: &MockServer,
        dir: &tempfile::TempDir,
        classifier: Option<Arc<dyn ClaimClassifier>>,
    ) -> ListenerContext {
        let store = JsonlReportStore::open(dir.path().join("r.jsonl")).await.unwrap();
        ListenerContext {
            client: TelegramClient::with_base_url("test-token", Duration::from_secs(5), server.uri())
                .unwrap(),
            store: Arc::new(store),
            classifier,
            max_input_length: 3000,
            poll_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn start_command_gets_greeting() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, &dir, None).await;

        let reply = handle_text(&ctx, "/start").await.unwrap();
        assert!(reply.contains("স্বাগতম"));
        assert!(handle_text(&ctx, "   ").await.is_none());
    }

    #[tokio::test]
    async fn claim_message_is_scored_stored_and_answered() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, &dir, Some(Arc::new(FakeClassifier::answering(RAW_FALSE)))).await;

        let reply = handle_text(&ctx, "ভোটের তারিখ পেছানো হয়েছে").await.unwrap();
        assert!(reply.contains("মিথ্যা"));
        assert!(reply.contains("82%"));
        assert!(reply.contains("❌"));
        assert_eq!(ctx.store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_ai_gets_apology() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, &dir, None).await;

        let reply = handle_text(&ctx, "দাবি").await.unwrap();
        assert!(reply.contains("AI সেবাটি"));
        assert!(ctx.store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listener_replies_then_stops_on_shutdown() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, &dir, Some(Arc::new(FakeClassifier::answering(RAW_FALSE)))).await;

        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    { "update_id": 1, "message": { "message_id": 1, "chat": { "id": 42 }, "text": "ভোটের তারিখ পেছানো হয়েছে" } }
                ]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "ok": true, "result": [] }))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({ "chat_id": "42" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = broadcast::channel(1);
        let store = ctx.store.clone();
        let handle = tokio::spawn(run_listener(ctx, rx));

        for _ in 0..50 {
            if !store.list_all().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // give the reply a moment to go out
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
