//! Conversation driver: one user turn against the active session

use parley_core::config::AgentConfig;
use parley_core::session::{ChatMessage, SessionStore};
use parley_providers::{LLMProvider, ProviderError, ProviderResult};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::context::ContextWindow;

const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Result of a successful `send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing changed
    Ignored,
    /// The model answered with this text
    Replied(String),
}

/// Drives a single request/reply turn for whichever session is active.
///
/// The driver holds no session state; the caller passes its store in for
/// each turn.
pub struct ConversationDriver {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
    context: ContextWindow,
}

impl ConversationDriver {
    /// Create a driver using the provider's default model
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let model = provider.get_default_model();
        Self {
            provider,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            context: ContextWindow::unbounded(),
        }
    }

    /// Create a driver with the model settings from config
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &AgentConfig) -> Self {
        Self::new(provider)
            .with_model(config.model.clone())
            .with_temperature(f64::from(config.temperature))
            .with_max_tokens(config.max_tokens)
            .with_context_window(ContextWindow::capped(config.context_window))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context_window(mut self, context: ContextWindow) -> Self {
        self.context = context;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn context_window(&self) -> ContextWindow {
        self.context
    }

    /// Send `user_text` in the active session and record the reply.
    ///
    /// The user message is appended before the model is called and stays in
    /// the log if the call fails; the next turn resends it as context. When
    /// no session is active the turn runs against a throwaway seed log and
    /// nothing is stored.
    pub async fn send(
        &self,
        store: &mut SessionStore,
        user_text: &str,
    ) -> ProviderResult<SendOutcome> {
        if user_text.trim().is_empty() {
            debug!("Ignoring blank message");
            return Ok(SendOutcome::Ignored);
        }

        let session = store
            .active_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());
        let span = info_span!("send", session = %session, model = %self.model);
        self.send_inner(store, user_text).instrument(span).await
    }

    async fn send_inner(
        &self,
        store: &mut SessionStore,
        user_text: &str,
    ) -> ProviderResult<SendOutcome> {
        let user_message = ChatMessage::user(user_text);
        let mut messages = store.get_active_messages();
        messages.push(user_message.clone());
        if !store.push_active(user_message) {
            debug!("No active session; reply will not be stored");
        }

        let context = self.context.build_messages(&messages);
        info!("Calling model with {} messages", context.len());

        let response = match self
            .provider
            .chat(
                context,
                Some(self.model.clone()),
                self.max_tokens,
                self.temperature,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Model call failed: {}", e);
                return Err(e);
            }
        };

        let reply = response
            .text_content()
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "model returned no text (finish_reason: {})",
                    response.finish_reason
                ))
            })?
            .to_string();

        messages.push(ChatMessage::assistant(reply.as_str()));
        store.update_messages(messages);
        debug!("Stored reply of {} chars", reply.chars().count());

        Ok(SendOutcome::Replied(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::session::DEFAULT_SYSTEM_PROMPT;
    use parley_providers::{LLMResponse, Message};
    use std::sync::Mutex;

    /// Replies with a fixed text and records every request
    struct StubProvider {
        reply: Option<String>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl StubProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _model: Option<String>,
            _max_tokens: Option<u32>,
            _temperature: f64,
        ) -> ProviderResult<LLMResponse> {
            self.requests.lock().unwrap().push(messages);
            match &self.reply {
                Some(text) => Ok(LLMResponse::text(text.clone())),
                None => Err(ProviderError::ApiError("HTTP 503: unavailable".to_string())),
            }
        }

        fn get_default_model(&self) -> String {
            "stub-model".to_string()
        }
    }

    /// Answers with a response that carries no content field
    struct NoContentProvider;

    #[async_trait]
    impl LLMProvider for NoContentProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _model: Option<String>,
            _max_tokens: Option<u32>,
            _temperature: f64,
        ) -> ProviderResult<LLMResponse> {
            Ok(LLMResponse {
                content: None,
                finish_reason: "length".to_string(),
                usage: Default::default(),
            })
        }

        fn get_default_model(&self) -> String {
            "stub-model".to_string()
        }
    }

    #[tokio::test]
    async fn test_send_appends_user_and_reply() {
        let provider = StubProvider::replying("4");
        let driver = ConversationDriver::new(provider.clone());
        let mut store = SessionStore::new();
        let id = store.create();

        let outcome = driver.send(&mut store, "2+2?").await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied("4".to_string()));
        assert_eq!(
            store.get_active_messages(),
            vec![
                ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
                ChatMessage::user("2+2?"),
                ChatMessage::assistant("4"),
            ]
        );
        // Short titles still get the marker.
        assert_eq!(store.get(id).unwrap().title(), "2+2?...");
        assert_eq!(
            provider.requests(),
            vec![vec![
                Message::system(DEFAULT_SYSTEM_PROMPT),
                Message::user("2+2?"),
            ]]
        );
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let provider = StubProvider::replying("unused");
        let driver = ConversationDriver::new(provider.clone());
        let mut store = SessionStore::new();
        store.create();

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                driver.send(&mut store, text).await.unwrap(),
                SendOutcome::Ignored
            );
        }

        assert_eq!(store.get_active_messages().len(), 1);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_user_turn() {
        let provider = StubProvider::failing();
        let driver = ConversationDriver::new(provider);
        let mut store = SessionStore::new();
        let id = store.create();

        let err = driver.send(&mut store, "hi").await.unwrap_err();

        assert!(err.to_string().contains("503"));
        assert_eq!(store.active_id(), Some(id));
        assert_eq!(
            store.get_active_messages(),
            vec![
                ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
                ChatMessage::user("hi"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_turn_is_resent_as_context() {
        let failing = StubProvider::failing();
        let mut store = SessionStore::new();
        let id = store.create();
        ConversationDriver::new(failing)
            .send(&mut store, "first")
            .await
            .unwrap_err();

        let provider = StubProvider::replying("ok");
        ConversationDriver::new(provider.clone())
            .send(&mut store, "second")
            .await
            .unwrap();

        assert_eq!(
            provider.requests()[0],
            vec![
                Message::system(DEFAULT_SYSTEM_PROMPT),
                Message::user("first"),
                Message::user("second"),
            ]
        );
        // Title comes from the first user message even though its reply never arrived.
        assert_eq!(store.get(id).unwrap().title(), "first...");
    }

    #[tokio::test]
    async fn test_context_grows_without_cap() {
        let provider = StubProvider::replying("ack");
        let driver = ConversationDriver::new(provider.clone());
        let mut store = SessionStore::new();
        store.create();

        for i in 0..25 {
            driver.send(&mut store, &format!("turn {}", i)).await.unwrap();
        }

        let sizes: Vec<usize> = provider.requests().iter().map(Vec::len).collect();
        assert_eq!(sizes.first(), Some(&2));
        assert_eq!(sizes.last(), Some(&50));
        assert!(sizes.windows(2).all(|w| w[1] == w[0] + 2));
    }

    #[tokio::test]
    async fn test_context_cap_limits_request() {
        let provider = StubProvider::replying("ack");
        let driver = ConversationDriver::new(provider.clone())
            .with_context_window(ContextWindow::capped(Some(4)));
        let mut store = SessionStore::new();
        store.create();

        for i in 0..10 {
            driver.send(&mut store, &format!("turn {}", i)).await.unwrap();
        }

        let last = provider.requests().pop().unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[0], Message::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(last[4], Message::user("turn 9"));
        // The stored log is never trimmed.
        assert_eq!(store.get_active_messages().len(), 21);
    }

    #[tokio::test]
    async fn test_send_without_active_session_stores_nothing() {
        let provider = StubProvider::replying("hello");
        let driver = ConversationDriver::new(provider.clone());
        let mut store = SessionStore::new();

        let outcome = driver.send(&mut store, "anyone?").await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied("hello".to_string()));
        assert!(store.is_empty());
        assert_eq!(provider.requests()[0].len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reply_is_stored() {
        let provider = StubProvider::replying("");
        let driver = ConversationDriver::new(provider);
        let mut store = SessionStore::new();
        let id = store.create();

        let outcome = driver.send(&mut store, "hi").await.unwrap();

        assert_eq!(outcome, SendOutcome::Replied(String::new()));
        assert_eq!(
            store.get_active_messages(),
            vec![
                ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
                ChatMessage::user("hi"),
                ChatMessage::assistant(""),
            ]
        );
        assert_eq!(store.get(id).unwrap().title(), "hi...");
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_and_keeps_user_turn() {
        let driver = ConversationDriver::new(Arc::new(NoContentProvider));
        let mut store = SessionStore::new();
        store.create();

        let err = driver.send(&mut store, "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
        assert_eq!(store.get_active_messages().len(), 2);
    }

    #[test]
    fn test_from_config_applies_settings() {
        let mut config = AgentConfig::default();
        config.context_window = Some(6);
        config.max_tokens = Some(512);
        let driver = ConversationDriver::from_config(StubProvider::replying("x"), &config);

        assert_eq!(driver.model(), "gemini/gemini-2.5-flash");
        assert!((driver.temperature() - 0.7).abs() < 1e-6);
        assert_eq!(driver.context_window().max_messages(), Some(6));
    }
}
