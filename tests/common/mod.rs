#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use webchat::config::Config;
use webchat::session::SessionIdProvider;
use webchat::storage::{KeyValueStore, MemoryStore};
use webchat::transport::WebhookClient;
use webchat::ui::chat::ChatWidget;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

pub const WEBHOOK_PATH: &str = "/webhook/chat";
pub const SESSION_ID: &str = "session-123";
pub const STORAGE_KEY: &str = "n8n-chat-session";

/// Mock webhook backend speaking the `sendMessage` / `loadPreviousSession` actions
pub struct WebhookMockServer {
    server: MockServer,
}

impl WebhookMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.set_webhook_url(format!("{}{}", self.server.uri(), WEBHOOK_PATH));
        config.request_timeout_secs = Some(5);
        config
    }

    /// Widget wired to this server, with `SESSION_ID` already persisted
    pub fn widget(&self) -> (ChatWidget, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.set_item(STORAGE_KEY, SESSION_ID).unwrap();
        (self.widget_with_store(store.clone()), store)
    }

    pub fn widget_with_store(&self, store: Arc<MemoryStore>) -> ChatWidget {
        let config = self.config();
        let client = WebhookClient::new(&config).unwrap();
        let store: Arc<dyn KeyValueStore> = store;
        let sessions = SessionIdProvider::new(Some(store), STORAGE_KEY);
        ChatWidget::new(config.widget, client, sessions)
    }

    /// Expect exactly one `sendMessage` with `text` and answer with `reply`
    pub async fn mock_reply(&self, text: &str, reply: Value) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .and(query_param("action", "sendMessage"))
            .and(body_json(json!({ "chatInput": text, "sessionId": SESSION_ID })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer the message `text` with `reply` after `delay`
    pub async fn mock_delayed_reply(&self, text: &str, reply: Value, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .and(query_param("action", "sendMessage"))
            .and(body_partial_json(json!({ "chatInput": text })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply).set_delay(delay))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer every `sendMessage` with a raw response
    pub async fn mock_send_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .and(query_param("action", "sendMessage"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Expect `expected` history loads and answer each with `response`
    pub async fn mock_history(&self, response: ResponseTemplate, expected: impl Into<Times>) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .and(query_param("action", "loadPreviousSession"))
            .respond_with(response)
            .expect(expected)
            .mount(&self.server)
            .await;
    }

    /// Fail the test if any request reaches the server
    pub async fn expect_no_requests(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    pub async fn requests_for(&self, action: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| {
                request
                    .url
                    .query_pairs()
                    .any(|(key, value)| key == "action" && value == action)
            })
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

/// Apply the next background event to the widget, failing after a few seconds
pub async fn apply_next_event(widget: &mut ChatWidget) {
    let event = tokio::time::timeout(Duration::from_secs(5), widget.next_event())
        .await
        .expect("timed out waiting for a widget event")
        .expect("event channel closed");
    widget.apply(event);
}

/// Give in-flight tasks a moment, then report how many events arrived
pub async fn drain_events(widget: &mut ChatWidget) -> usize {
    tokio::time::sleep(Duration::from_millis(200)).await;
    widget.process_events()
}
