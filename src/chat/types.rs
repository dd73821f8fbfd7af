//! Conversation data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn.
///
/// `content` is mutable while an assistant turn is streaming; `streaming`
/// is true only while chunks are still being appended to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub streaming: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Maximum length of a derived conversation title, in characters.
const TITLE_MAX_CHARS: usize = 50;

const DEFAULT_TITLE: &str = "New Chat";

/// An ordered, append-only sequence of turns.
///
/// The title is derived once from the first user turn. At most one turn
/// may be streaming at any instant; `begin_assistant` enforces this by
/// finishing any previous streaming turn first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub model_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model_id: model_id.into(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, refreshing `updated_at` and deriving the title
    /// from the first user turn if it has not been set yet.
    pub fn push(&mut self, message: Message) {
        if self.title == DEFAULT_TITLE && message.role == Role::User && !message.content.is_empty()
        {
            self.title = message.content.chars().take(TITLE_MAX_CHARS).collect();
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Append an empty streaming assistant turn and return its id.
    pub fn begin_assistant(&mut self) -> Uuid {
        self.finish_streaming();
        let mut message = Message::assistant("");
        message.streaming = true;
        let id = message.id;
        self.push(message);
        id
    }

    /// Append a chunk to the turn with the given id while it streams.
    pub fn append_chunk(&mut self, id: Uuid, chunk: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.content.push_str(chunk);
            self.updated_at = Utc::now();
        }
    }

    /// Clear the streaming flag on any in-flight turn.
    pub fn finish_streaming(&mut self) {
        for message in &mut self.messages {
            message.streaming = false;
        }
    }

    /// The turn currently being streamed to, if any.
    pub fn streaming_turn(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }

    /// Remove every turn. The derived title is kept.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_derived_from_first_user_turn() {
        let mut convo = Conversation::new("test-model");
        convo.push(Message::user("Hello there, how do I write a parser?"));
        convo.push(Message::user("Second message should not retitle"));

        assert_eq!(convo.title, "Hello there, how do I write a parser?");
    }

    #[test]
    fn title_truncated_to_fifty_chars() {
        let long = "x".repeat(120);
        let mut convo = Conversation::new("test-model");
        convo.push(Message::user(long));

        assert_eq!(convo.title.chars().count(), 50);
    }

    #[test]
    fn at_most_one_streaming_turn() {
        let mut convo = Conversation::new("test-model");
        convo.push(Message::user("Hi"));
        let first = convo.begin_assistant();
        convo.append_chunk(first, "partial");
        let second = convo.begin_assistant();

        let streaming: Vec<_> = convo.messages.iter().filter(|m| m.streaming).collect();
        assert_eq!(streaming.len(), 1);
        assert_eq!(streaming[0].id, second);
    }

    #[test]
    fn append_chunk_updates_content() {
        let mut convo = Conversation::new("test-model");
        let id = convo.begin_assistant();
        convo.append_chunk(id, "Hello ");
        convo.append_chunk(id, "world");
        convo.finish_streaming();

        assert_eq!(convo.messages[0].content, "Hello world");
        assert!(convo.streaming_turn().is_none());
    }
}
