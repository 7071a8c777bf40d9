//! Context builder for assembling model requests

use parley_core::session::ChatMessage;
use parley_providers::Message;

/// How much of a session log is sent to the model.
///
/// The default sends everything, so the request grows with the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextWindow {
    max_messages: Option<usize>,
}

impl ContextWindow {
    /// Send the whole log
    pub fn unbounded() -> Self {
        Self { max_messages: None }
    }

    /// Keep the leading system messages plus the newest `max_messages` others.
    /// `None` means unbounded.
    pub fn capped(max_messages: Option<usize>) -> Self {
        Self { max_messages }
    }

    pub fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    /// Build the ordered message list for one model call
    pub fn build_messages(&self, log: &[ChatMessage]) -> Vec<Message> {
        let preamble = log
            .iter()
            .take_while(|m| matches!(m, ChatMessage::System(_)))
            .count();
        let (head, tail) = log.split_at(preamble);

        let skip = match self.max_messages {
            Some(max) => tail.len().saturating_sub(max),
            None => 0,
        };

        head.iter()
            .chain(tail.iter().skip(skip))
            .map(to_provider_message)
            .collect()
    }
}

fn to_provider_message(message: &ChatMessage) -> Message {
    match message {
        ChatMessage::System(text) => Message::system(text.as_str()),
        ChatMessage::User(text) => Message::user(text.as_str()),
        ChatMessage::Assistant(text) => Message::assistant(text.as_str()),
    }
}
