//! Message model and the ordered conversation store

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::normalize::{NormalizedReply, normalize_reply};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageOrigin {
    User,
    Assistant,
}

/// A single immutable entry in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub origin: MessageOrigin,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            origin: MessageOrigin::User,
            timestamp: Local::now(),
            suggestions: None,
        }
    }

    pub fn assistant(text: impl Into<String>, suggestions: Option<Vec<String>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            origin: MessageOrigin::Assistant,
            timestamp: Local::now(),
            suggestions,
        }
    }

    pub fn from_reply(reply: NormalizedReply) -> Self {
        Self::assistant(reply.text, reply.suggestions)
    }

    /// Build the `index`-th message of a previously stored session.
    ///
    /// The entry is attributed to the user when its `sender` (or, if that is
    /// missing, its `role`) equals `"user"`.
    pub fn from_history_entry(index: usize, entry: &Value) -> Self {
        let reply = normalize_reply(entry);
        let author = entry
            .get("sender")
            .filter(|sender| !sender.is_null())
            .or_else(|| entry.get("role"));
        let origin = if author.and_then(Value::as_str) == Some("user") {
            MessageOrigin::User
        } else {
            MessageOrigin::Assistant
        };

        Self {
            id: format!("h-{}", index),
            text: reply.text,
            origin,
            timestamp: Local::now(),
            suggestions: reply.suggestions,
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == MessageOrigin::User
    }

    /// Quick replies offered with this message; user messages never offer any.
    pub fn quick_replies(&self) -> &[String] {
        match (&self.origin, &self.suggestions) {
            (MessageOrigin::Assistant, Some(suggestions)) => suggestions,
            _ => &[],
        }
    }
}

/// Append-only, chronologically ordered transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with a single assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                id: "greeting".to_string(),
                ..Message::assistant(greeting, None)
            }],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Keep the opening message and replace everything after it with `history`.
    pub fn replace_history(&mut self, history: Vec<Message>) {
        self.messages.truncate(1);
        self.messages.extend(history);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Every activatable quick reply, in transcript order
    pub fn quick_replies(&self) -> Vec<QuickReplyRef<'_>> {
        self.messages
            .iter()
            .enumerate()
            .flat_map(|(message_index, message)| {
                message
                    .quick_replies()
                    .iter()
                    .enumerate()
                    .map(move |(suggestion_index, label)| QuickReplyRef {
                        message_index,
                        suggestion_index,
                        label,
                    })
            })
            .collect()
    }
}

/// Position of a quick reply inside the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickReplyRef<'a> {
    pub message_index: usize,
    pub suggestion_index: usize,
    pub label: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn greeting_survives_history_replacement() {
        let mut conversation = Conversation::with_greeting("hello");
        conversation.push(Message::user("typed before history arrived"));

        conversation.replace_history(vec![
            Message::from_history_entry(0, &json!({ "sender": "user", "text": "earlier" })),
            Message::from_history_entry(1, &json!({ "role": "assistant", "text": "reply" })),
        ]);

        let texts: Vec<_> = conversation.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hello", "earlier", "reply"]);
        assert_eq!(conversation.messages()[0].id, "greeting");
    }

    #[test]
    fn history_origin_prefers_sender_over_role() {
        let entry = json!({ "sender": "bot", "role": "user", "message": "x" });
        assert_eq!(Message::from_history_entry(0, &entry).origin, MessageOrigin::Assistant);

        let entry = json!({ "sender": null, "role": "user", "message": "x" });
        assert_eq!(Message::from_history_entry(0, &entry).origin, MessageOrigin::User);

        let entry = json!({ "message": "x" });
        assert_eq!(Message::from_history_entry(3, &entry).id, "h-3");
    }

    #[test]
    fn history_entries_are_normalized() {
        let entry = json!({ "sender": "bot", "body": "{\"text\":\"wrapped\",\"buttons\":[\"A\"]}" });
        let message = Message::from_history_entry(0, &entry);
        assert_eq!(message.text, "wrapped");
        assert_eq!(message.quick_replies(), ["A".to_string()]);
    }

    #[test]
    fn quick_replies_skip_user_messages() {
        let mut conversation = Conversation::with_greeting("hi");
        let mut user = Message::user("u");
        user.suggestions = Some(vec!["ignored".into()]);
        conversation.push(user);
        conversation.push(Message::assistant("a", Some(vec!["One".into(), "Two".into()])));

        let labels: Vec<_> = conversation.quick_replies().iter().map(|r| r.label).collect();
        assert_eq!(labels, ["One", "Two"]);
        assert_eq!(conversation.quick_replies()[1].message_index, 2);
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::user("same");
        let b = Message::user("same");
        assert_ne!(a.id, b.id);
    }
}
