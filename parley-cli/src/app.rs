//! State of one interactive chat session

use parley_agent::{ConversationDriver, SendOutcome};
use parley_core::session::{SessionId, SessionStore};
use tracing::{info, warn};

/// A line typed into the input box, after slash-command parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/new`
    NewChat,
    /// `/select <id>`
    Select(String),
    /// `/clear`
    ClearAll,
    /// `/quit`
    Quit,
    /// Anything else is sent to the model as-is
    Message(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some(("/select", arg)) => Self::Select(arg.trim().to_string()),
            _ => match trimmed {
                "/new" => Self::NewChat,
                "/select" => Self::Select(String::new()),
                "/clear" => Self::ClearAll,
                "/quit" => Self::Quit,
                _ => Self::Message(input.to_string()),
            },
        }
    }
}

/// Everything the terminal UI shows and mutates.
///
/// Created when the UI starts and dropped when it exits; the session store
/// inside goes with it.
pub struct ChatApp {
    store: SessionStore,
    driver: ConversationDriver,
    pub input: String,
    /// Error from the last interaction, shown until the next one
    pub error: Option<String>,
    /// Text of the turn waiting on the model
    pub pending: Option<String>,
    pub scroll: u16,
    /// Keep the log scrolled to the newest message
    pub follow: bool,
    pub should_quit: bool,
}

impl ChatApp {
    pub fn new(mut store: SessionStore, driver: ConversationDriver) -> Self {
        store.ensure_session();
        Self {
            store,
            driver,
            input: String::new(),
            error: None,
            pending: None,
            scroll: 0,
            follow: true,
            should_quit: false,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn model(&self) -> &str {
        self.driver.model()
    }

    pub fn new_chat(&mut self) {
        self.begin_interaction();
        let id = self.store.create();
        info!(session = %id, "New chat");
    }

    pub fn select(&mut self, id: SessionId) {
        self.begin_interaction();
        if let Err(e) = self.store.select(id) {
            self.error = Some(format!("Error: {}", e));
        }
    }

    /// Select the chat listed before (`-1`) or after (`+1`) the active one
    pub fn select_neighbor(&mut self, offset: isize) {
        if let Some(id) = self.store.neighbor(offset) {
            self.select(id);
        }
    }

    pub fn clear_all(&mut self) {
        self.begin_interaction();
        self.store.clear_all();
        info!("Cleared all chats");
        self.store.ensure_session();
    }

    /// Take the input buffer and turn it into a command
    pub fn take_input(&mut self) -> Command {
        let raw = std::mem::take(&mut self.input);
        Command::parse(&raw)
    }

    /// Apply a parsed command. Returns the text to send to the model, if any.
    pub fn apply(&mut self, command: Command) -> Option<String> {
        match command {
            Command::NewChat => self.new_chat(),
            Command::ClearAll => self.clear_all(),
            Command::Quit => self.should_quit = true,
            Command::Select(raw) => match raw.parse::<SessionId>() {
                Ok(id) => self.select(id),
                Err(e) => self.error = Some(format!("Error: {}", e)),
            },
            Command::Message(text) => {
                if text.trim().is_empty() {
                    return None;
                }
                self.begin_interaction();
                self.pending = Some(text.clone());
                return Some(text);
            }
        }
        None
    }

    /// Run one model turn. Blocks the interaction until the model answers.
    pub async fn submit(&mut self, text: &str) {
        self.pending = Some(text.to_string());
        let result = self.driver.send(&mut self.store, text).await;
        self.pending = None;
        match result {
            Ok(SendOutcome::Replied(_)) | Ok(SendOutcome::Ignored) => {}
            Err(e) => {
                warn!("Send failed: {}", e);
                self.error = Some(format!("Error: {}", e));
            }
        }
        self.follow = true;
        self.store.ensure_session();
    }

    fn begin_interaction(&mut self) {
        self.error = None;
        self.follow = true;
    }
}
