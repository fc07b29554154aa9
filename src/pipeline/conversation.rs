//! Append-only conversation log used for replay and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::UiEvent;

/// One replayable entry of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub timestamp: DateTime<Utc>,
    /// The UI event tag (`output`, `toolUse`, ...).
    pub message_type: String,
    pub data: Value,
}

impl ConversationMessage {
    #[must_use]
    pub fn from_event(event: &UiEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            message_type: event.kind().to_string(),
            data: event.payload(),
        }
    }

    /// The payload as text, for `output`/`userInput`/`error` entries.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }
}

/// Text of the first user message.
#[must_use]
pub fn first_user_message(messages: &[ConversationMessage]) -> Option<&str> {
    messages
        .iter()
        .find(|m| m.message_type == "userInput")
        .and_then(ConversationMessage::text)
}

/// Text of the most recent user, assistant or error message.
#[must_use]
pub fn last_message(messages: &[ConversationMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .filter(|m| matches!(m.message_type.as_str(), "userInput" | "output" | "error"))
        .find_map(ConversationMessage::text)
}

/// Conversation entries for the current session.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
}

impl ConversationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the event if it is persistent. Returns whether it was kept.
    pub fn record(&mut self, event: &UiEvent) -> bool {
        if !event.is_persistent() {
            return false;
        }
        self.messages.push(ConversationMessage::from_event(event));
        true
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Timestamp of the first entry.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.messages.first().map(|m| m.timestamp)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
