//! Conversation logic for parley
//!
//! Turns a user message into a model call over the active session's history
//! and writes the reply back into the session store.

pub mod context;
pub mod conversation;

pub use context::ContextWindow;
pub use conversation::{ConversationDriver, SendOutcome};
