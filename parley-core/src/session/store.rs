//! Session data structures

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title shown for a session until its first user message arrives
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// Number of characters kept from the first user message when deriving a title
pub const TITLE_MAX_CHARS: usize = 30;

/// Default seed prompt for new sessions
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Process-local session identifier, rendered as `chat_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat_{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let digits = raw.strip_prefix("chat_").unwrap_or(raw);
        digits
            .parse::<u64>()
            .map(SessionId)
            .map_err(|_| crate::Error::Validation(format!("invalid session id: {}", raw)))
    }
}

/// A chat message, discriminated by role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant(String),
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(content.into())
    }

    /// Message body
    pub fn content(&self) -> &str {
        match self {
            Self::System(text) | Self::User(text) | Self::Assistant(text) => text,
        }
    }

    /// Role name as used on the wire
    pub fn role(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
        }
    }
}

/// Build the title for a session from its first user message.
///
/// The marker is appended even when the text fits.
pub fn derive_title(first_user_message: &str) -> String {
    let head: String = first_user_message.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head)
}

/// A conversation session
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Derived title, `None` until the first user message
    title: Option<String>,
    /// Messages in the session, oldest first
    messages: Vec<ChatMessage>,
    /// Session creation time
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session seeded with one system message
    pub fn new(id: SessionId, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            title: None,
            messages: vec![ChatMessage::system(system_prompt)],
            created_at: Utc::now(),
        }
    }

    /// Display title
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(PLACEHOLDER_TITLE)
    }

    /// Whether the title has been derived yet
    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Creation time as an ISO-8601 string
    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Replace the log; derive the title once when the second entry is a user message.
    ///
    /// An empty replacement is refused so the seed message survives.
    pub(crate) fn replace_messages(&mut self, messages: Vec<ChatMessage>) -> bool {
        if messages.is_empty() {
            return false;
        }
        if self.title.is_none() {
            if let Some(ChatMessage::User(text)) = messages.get(1) {
                self.title = Some(derive_title(text));
            }
        }
        self.messages = messages;
        true
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new(SessionId::new(1), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(session.id.to_string(), "chat_1");
        assert_eq!(session.title(), PLACEHOLDER_TITLE);
        assert_eq!(
            session.messages(),
            &[ChatMessage::system(DEFAULT_SYSTEM_PROMPT)]
        );
    }

    #[test]
    fn test_created_at_iso_round_trips() {
        let session = Session::new(SessionId::new(1), "seed");
        let iso = session.created_at_iso();
        assert!(iso.ends_with('Z'));
        let parsed = DateTime::parse_from_rfc3339(&iso).unwrap();
        assert_eq!(parsed.timestamp(), session.created_at().timestamp());
    }

    #[test]
    fn test_derive_title_truncates_and_marks() {
        assert_eq!(
            derive_title("hello world this is a long message"),
            "hello world this is a long mes..."
        );
        assert_eq!(derive_title("2+2?"), "2+2?...");
    }

    #[test]
    fn test_derive_title_counts_characters_not_bytes() {
        let text = "é".repeat(40);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn test_replace_refuses_empty_log() {
        let mut session = Session::new(SessionId::new(1), "seed");
        assert!(!session.replace_messages(Vec::new()));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_title_ignores_non_user_second_entry() {
        let mut session = Session::new(SessionId::new(1), "seed");
        session.replace_messages(vec![
            ChatMessage::system("seed"),
            ChatMessage::assistant("hello"),
        ]);
        assert!(!session.has_title());
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
        let back: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "4"}))
                .unwrap();
        assert_eq!(back, ChatMessage::assistant("4"));
    }

    #[test]
    fn test_session_id_parse() {
        assert_eq!("chat_7".parse::<SessionId>().unwrap(), SessionId::new(7));
        assert_eq!("7".parse::<SessionId>().unwrap(), SessionId::new(7));
        assert!("chat_x".parse::<SessionId>().is_err());
    }
}
