use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::config::Config;

/// Actions the webhook understands, selected with the `action` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum WebhookAction {
    SendMessage,
    LoadPreviousSession,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook answered with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("webhook reply is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the conversational webhook
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    chat_input_key: String,
    session_key: String,
}

impl WebhookClient {
    pub fn new(config: &Config) -> Result<Self> {
        let url = config.require_webhook_url()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
            chat_input_key: config.chat_input_key.clone(),
            session_key: config.session_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post a user message; the reply is returned undecoded for the normalizer.
    pub async fn send_message(&self, text: &str, session_id: &str) -> Result<Value, TransportError> {
        let mut body = Map::new();
        body.insert(self.chat_input_key.clone(), Value::from(text));
        body.insert(self.session_key.clone(), Value::from(session_id));

        self.post(WebhookAction::SendMessage, Value::Object(body)).await
    }

    /// Fetch the stored transcript for a session.
    ///
    /// A reply without a `messages` array means there is no history.
    pub async fn load_previous_session(&self, session_id: &str) -> Result<Vec<Value>, TransportError> {
        let mut body = Map::new();
        body.insert(self.session_key.clone(), Value::from(session_id));

        let reply = self
            .post(WebhookAction::LoadPreviousSession, Value::Object(body))
            .await?;

        Ok(match reply {
            Value::Object(mut object) => match object.remove("messages") {
                Some(Value::Array(messages)) => messages,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        })
    }

    async fn post(&self, action: WebhookAction, body: Value) -> Result<Value, TransportError> {
        tracing::debug!(%action, "posting to webhook");

        let response = self
            .client
            .post(&self.url)
            .query(&[("action", action.as_ref())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(%action, %status, "webhook responded");
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_use_camel_case_query_values() {
        assert_eq!(WebhookAction::SendMessage.as_ref(), "sendMessage");
        assert_eq!(WebhookAction::LoadPreviousSession.to_string(), "loadPreviousSession");
    }

    #[test]
    fn client_requires_url() {
        let config = Config::default();
        assert!(WebhookClient::new(&config).is_err());

        let mut config = Config::default();
        config.set_webhook_url("http://127.0.0.1:9/hook");
        assert_eq!(WebhookClient::new(&config).unwrap().url(), "http://127.0.0.1:9/hook");
    }
}
