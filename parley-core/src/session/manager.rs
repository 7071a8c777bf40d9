//! In-memory store for the sessions of one interactive user

use super::store::{ChatMessage, Session, SessionId, DEFAULT_SYSTEM_PROMPT};
use std::collections::BTreeMap;
use tracing::debug;

/// Holds every chat session of one interactive session plus the active pointer.
///
/// A store is owned by whatever drives the UI and is dropped with it. It is
/// never shared between users; callers hand out `&mut` access one
/// interaction at a time.
#[derive(Debug)]
pub struct SessionStore {
    /// Sessions keyed by id; ids are minted in increasing order so iteration
    /// follows creation order
    sessions: BTreeMap<SessionId, Session>,
    /// Currently displayed session
    active: Option<SessionId>,
    /// Last minted id number; survives `clear_all`
    counter: u64,
    /// Seed prompt for new sessions
    system_prompt: String,
}

impl SessionStore {
    /// Create an empty store with the default seed prompt
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    /// Create an empty store with a custom seed prompt
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            active: None,
            counter: 0,
            system_prompt: system_prompt.into(),
        }
    }

    /// Create a session, make it active, and return its id
    pub fn create(&mut self) -> SessionId {
        self.counter += 1;
        let id = SessionId::new(self.counter);
        self.sessions
            .insert(id, Session::new(id, self.system_prompt.clone()));
        self.active = Some(id);
        debug!(session = %id, "Created session");
        id
    }

    /// Create a session if nothing is active and the store is empty
    pub fn ensure_session(&mut self) -> Option<SessionId> {
        if self.active.is_none() && self.sessions.is_empty() {
            self.create();
        }
        self.active
    }

    /// Messages of the active session, or a fresh seed log when none is active
    pub fn get_active_messages(&self) -> Vec<ChatMessage> {
        self.active_session()
            .map(|session| session.messages().to_vec())
            .unwrap_or_else(|| self.seed_log())
    }

    /// Replace the active session's log. Ignored when nothing is active.
    pub fn update_messages(&mut self, messages: Vec<ChatMessage>) {
        let Some(session) = self.active_session_mut() else {
            debug!("update_messages without an active session, ignoring");
            return;
        };
        if !session.replace_messages(messages) {
            debug!(session = %session.id, "Refusing to replace log with an empty one");
        }
    }

    /// Append one message to the active log without touching the title.
    /// Returns false when nothing is active.
    pub fn push_active(&mut self, message: ChatMessage) -> bool {
        match self.active_session_mut() {
            Some(session) => {
                session.push(message);
                true
            }
            None => false,
        }
    }

    /// Make `id` the active session.
    ///
    /// Unknown ids are rejected and the active session stays as it was.
    pub fn select(&mut self, id: SessionId) -> crate::Result<()> {
        if !self.sessions.contains_key(&id) {
            return Err(crate::Error::NotFound(format!("session {}", id)));
        }
        self.active = Some(id);
        debug!(session = %id, "Selected session");
        Ok(())
    }

    /// Drop every session and unset the active pointer
    pub fn clear_all(&mut self) {
        debug!(count = self.sessions.len(), "Clearing all sessions");
        self.sessions.clear();
        self.active = None;
    }

    /// Active session id
    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    /// Active session
    pub fn active_session(&self) -> Option<&Session> {
        self.active.and_then(|id| self.sessions.get(&id))
    }

    fn active_session_mut(&mut self) -> Option<&mut Session> {
        self.active.and_then(|id| self.sessions.get_mut(&id))
    }

    /// Get a session if it exists
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Sessions in creation order
    pub fn list(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Id of the session created just before (`-1`) or after (`+1`) the active one
    pub fn neighbor(&self, offset: isize) -> Option<SessionId> {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        let current = self.active.and_then(|id| ids.iter().position(|&i| i == id))?;
        let target = current.checked_add_signed(offset)?;
        ids.get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn seed_log(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system_prompt.clone())]
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
