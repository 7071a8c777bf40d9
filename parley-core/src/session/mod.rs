//! Session management for conversation history
//!
//! Sessions live in memory only and disappear with the process.

pub mod manager;
pub mod store;

pub use manager::SessionStore;
pub use store::{
    derive_title, ChatMessage, Session, SessionId, DEFAULT_SYSTEM_PROMPT, PLACEHOLDER_TITLE,
};
