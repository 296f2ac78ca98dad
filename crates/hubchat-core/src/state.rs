//! UI-agnostic conversation state
//!
//! The transcript is an explicit ordered list owned by the controller.
//! Front ends render it as a projection and never mutate it directly.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::format;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Bot-role message that reports a failed request
    #[serde(default)]
    pub error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            error: false,
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            content: content.into(),
            error: false,
        }
    }

    pub fn bot_error(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            content: content.into(),
            error: true,
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Bot => "bot",
        }
    }
}

/// Identifier of a transcript entry.
///
/// Time-based: the high bits are the creation time in milliseconds, the
/// low bits a process-wide sequence number, so two ids minted in the same
/// millisecond still differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

static ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

impl EntryId {
    fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let seq = ENTRY_SEQ.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
        EntryId((millis << 16) | seq)
    }

    /// DOM-style key, e.g. `typing-1712345678901-3`
    pub fn key(&self, prefix: &str) -> String {
        format!("{}-{}-{}", prefix, self.0 >> 16, self.0 & 0xFFFF)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    Message(ChatMessage),
    TypingIndicator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub body: EntryBody,
}

impl Entry {
    pub fn message(&self) -> Option<&ChatMessage> {
        match &self.body {
            EntryBody::Message(msg) => Some(msg),
            EntryBody::TypingIndicator => None,
        }
    }

    pub fn is_typing_indicator(&self) -> bool {
        matches!(self.body, EntryBody::TypingIndicator)
    }
}

/// Ordered list of rendered chat entries, oldest first
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, content: impl Into<String>, role: ChatRole) -> EntryId {
        let message = match role {
            ChatRole::User => ChatMessage::user(content),
            ChatRole::Bot => ChatMessage::bot(content),
        };
        self.push_message(message)
    }

    pub fn push_message(&mut self, message: ChatMessage) -> EntryId {
        self.push(EntryBody::Message(message))
    }

    pub fn add_typing_indicator(&mut self) -> EntryId {
        self.push(EntryBody::TypingIndicator)
    }

    fn push(&mut self, body: EntryBody) -> EntryId {
        let id = EntryId::generate();
        self.entries.push(Entry { id, body });
        id
    }

    /// Remove an entry by id. Returns false if it was already gone.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn remove_typing_indicator(&mut self, id: EntryId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) if self.entries[idx].is_typing_indicator() => {
                self.entries.remove(idx);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(Entry::message)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.entries.last().and_then(Entry::message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_typing_indicator(&self) -> bool {
        self.entries.iter().any(Entry::is_typing_indicator)
    }

    /// Escaped HTML fragment of the whole transcript.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"chat-messages\">\n");
        for entry in &self.entries {
            match &entry.body {
                EntryBody::Message(msg) => {
                    let class = if msg.error {
                        format!("message {}-message error", msg.role.as_str())
                    } else {
                        format!("message {}-message", msg.role.as_str())
                    };
                    html.push_str(&format!(
                        "  <div class=\"{}\"><div class=\"message-content\">{}</div></div>\n",
                        class,
                        format::to_html(&msg.content)
                    ));
                }
                EntryBody::TypingIndicator => {
                    html.push_str(&format!(
                        "  <div class=\"message bot-message typing-indicator\" id=\"{}\"></div>\n",
                        entry.id.key("typing")
                    ));
                }
            }
        }
        html.push_str("</div>\n");
        html
    }
}
