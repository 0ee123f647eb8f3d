use std::time::Duration;

use tokio::sync::mpsc;

use crate::conversation::Message;
use crate::events::{Effect, WidgetEvent};
use crate::normalize::normalize_reply;
use crate::session::SessionIdProvider;
use crate::transport::WebhookClient;

/// Runs the network side of the conversation.
///
/// Every effect runs on its own task and reports back through the event
/// channel, so the UI keeps handling input while requests are in flight.
/// Requests are neither deduplicated nor ordered: replies are posted in
/// completion order.
#[derive(Clone)]
pub struct ChatController {
    client: WebhookClient,
    sessions: SessionIdProvider,
    error_text: String,
    events: mpsc::UnboundedSender<WidgetEvent>,
}

impl ChatController {
    pub fn new(
        client: WebhookClient,
        sessions: SessionIdProvider,
        error_text: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<WidgetEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            client,
            sessions,
            error_text: error_text.into(),
            events,
        };
        (controller, rx)
    }

    /// Start the work an effect asks for in the background.
    pub fn dispatch(&self, effect: Effect) {
        let controller = self.clone();
        match effect {
            Effect::SendMessage(text) => {
                tokio::spawn(async move {
                    let reply = controller.fetch_reply(&text).await;
                    controller.post(WidgetEvent::ReplyReceived(reply));
                });
            }
            Effect::LoadHistory => {
                tokio::spawn(async move {
                    if let Some(history) = controller.fetch_history().await {
                        controller.post(WidgetEvent::HistoryLoaded(history));
                    }
                });
            }
        }
    }

    /// Post `event` after `delay`.
    pub fn schedule(&self, delay: Duration, event: WidgetEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }

    /// Send `text` and turn whatever comes back into an assistant message.
    ///
    /// Transport and decoding failures become the configured error text.
    pub async fn fetch_reply(&self, text: &str) -> Message {
        let session_id = self.sessions.session_id();
        match self.client.send_message(text, &session_id).await {
            Ok(payload) => Message::from_reply(normalize_reply(&payload)),
            Err(err) => {
                tracing::error!(error = %err, "webhook error while sending message");
                Message::assistant(self.error_text.clone(), None)
            }
        }
    }

    /// Load and normalize the previous session's transcript.
    ///
    /// Returns `None` when there is nothing to show, including on any error.
    pub async fn fetch_history(&self) -> Option<Vec<Message>> {
        let session_id = self.sessions.session_id();
        let entries = match self.client.load_previous_session(&session_id).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "could not load previous session");
                return None;
            }
        };

        if entries.is_empty() {
            return None;
        }

        tracing::debug!(count = entries.len(), "loaded previous session");
        Some(
            entries
                .iter()
                .enumerate()
                .map(|(index, entry)| Message::from_history_entry(index, entry))
                .collect(),
        )
    }

    fn post(&self, event: WidgetEvent) {
        // The receiver only goes away when the widget is shutting down.
        let _ = self.events.send(event);
    }
}
