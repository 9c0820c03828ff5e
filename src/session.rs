//! Conversation session: displayed messages, persisted context and the
//! lifecycle of a single turn.
//!
//! A turn runs in two phases. [`ConversationSession::begin_turn`] shows the
//! user's message and a placeholder before anything touches the network;
//! [`ConversationSession::finish_turn`] either fills the placeholder with the
//! reply and records the turn in the context, or swaps it for a diagnostic
//! and leaves the context alone. [`ConversationSession::submit`] runs both.

use std::sync::Arc;

use crate::assistant::{AssistantRequest, RemoteAssistant};
use crate::error::ChatError;
use crate::history::MessageList;
use crate::profile::{self, Profile};
use crate::storage::SessionStore;
use crate::types::{Context, ContextEntry, Message, MessageId};

/// Diagnostic shown in place of a reply when a turn fails
pub const CONNECTION_ERROR_TEXT: &str = "**ERROR:** Could not connect to the backend server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Busy,
}

/// A turn whose user message and placeholder are already displayed
#[derive(Debug)]
pub struct PendingTurn {
    text: String,
    placeholder_id: MessageId,
}

impl PendingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn placeholder_id(&self) -> MessageId {
        self.placeholder_id
    }
}

/// Result of a successful round trip, not yet recorded
#[derive(Debug, Clone)]
pub struct Exchange {
    pub prompt: String,
    pub reply: String,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input, or a turn was already in flight
    Ignored,
    Replied { id: MessageId, text: String },
    Failed { id: MessageId },
}

/// Owns the displayed messages for the life of the session
pub struct ConversationSession {
    assistant: Arc<dyn RemoteAssistant>,
    context_store: Arc<dyn SessionStore<Context>>,
    profile_store: Arc<dyn SessionStore<Profile>>,
    messages: MessageList,
    input: String,
    state: SessionState,
    greeting: String,
}

impl ConversationSession {
    pub fn new(
        assistant: Arc<dyn RemoteAssistant>,
        context_store: Arc<dyn SessionStore<Context>>,
        profile_store: Arc<dyn SessionStore<Profile>>,
        greeting: impl Into<String>,
    ) -> Self {
        let mut session = Self {
            assistant,
            context_store,
            profile_store,
            messages: MessageList::new(),
            input: String::new(),
            state: SessionState::Idle,
            greeting: greeting.into(),
        };
        session.push_greeting();
        session
    }

    fn push_greeting(&mut self) {
        if !self.greeting.is_empty() {
            let greeting = self.greeting.clone();
            self.messages.push_bot(greeting);
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.messages()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Busy
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&mut self) -> TurnOutcome {
        let Some(pending) = self.begin_input_turn() else {
            return TurnOutcome::Ignored;
        };
        let result = self.run_exchange(&pending).await;
        self.finish_turn(pending, result)
    }

    /// [`begin_turn`](Self::begin_turn) on the input buffer. The buffer is
    /// only cleared when the turn starts.
    pub fn begin_input_turn(&mut self) -> Option<PendingTurn> {
        let text = self.input.clone();
        self.begin_turn(&text)
    }

    /// Run one full turn for `text`.
    pub async fn submit(&mut self, text: &str) -> TurnOutcome {
        let Some(pending) = self.begin_turn(text) else {
            return TurnOutcome::Ignored;
        };
        let result = self.run_exchange(&pending).await;
        self.finish_turn(pending, result)
    }

    /// Show the user's message and a placeholder, and mark the session busy.
    ///
    /// Returns `None` without touching anything when the text is blank or a
    /// turn is already in flight.
    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() || self.is_busy() {
            return None;
        }

        self.messages.push_user(text);
        self.input.clear();
        let placeholder_id = self.messages.append_pending();
        self.state = SessionState::Busy;

        Some(PendingTurn {
            text: text.to_string(),
            placeholder_id,
        })
    }

    /// Load the context, compose the prompt and ask the assistant.
    ///
    /// Makes exactly one assistant call, unless the context cannot be read.
    pub async fn run_exchange(&self, pending: &PendingTurn) -> Result<Exchange, ChatError> {
        let context = self.context_store.load()?;
        let profile = self.profile_store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable profile");
            Profile::default()
        });

        let prompt = profile::compose_prompt(&profile, &pending.text);
        let request = AssistantRequest {
            message: prompt,
            context,
        };
        let reply = self.assistant.generate(&request).await?;

        Ok(Exchange {
            prompt: request.message,
            reply,
            context: request.context,
        })
    }

    /// Settle a pending turn and return the session to idle.
    pub fn finish_turn(&mut self, pending: PendingTurn, result: Result<Exchange, ChatError>) -> TurnOutcome {
        let outcome = match result.and_then(|exchange| self.record(exchange)) {
            Ok(reply) => {
                let id = self.messages.resolve(pending.placeholder_id, reply.clone());
                tracing::info!(id, "Turn completed");
                TurnOutcome::Replied { id, text: reply }
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                self.messages.remove(pending.placeholder_id);
                let id = self.messages.push_bot(CONNECTION_ERROR_TEXT);
                TurnOutcome::Failed { id }
            }
        };
        self.state = SessionState::Idle;
        outcome
    }

    /// Persist the two halves of a completed turn; the reply is returned
    /// only once they are stored.
    fn record(&self, exchange: Exchange) -> Result<String, ChatError> {
        let Exchange {
            prompt,
            reply,
            mut context,
        } = exchange;
        context.push(ContextEntry::user(prompt));
        context.push(ContextEntry::assistant(reply.clone()));
        self.context_store.save(&context)?;
        Ok(reply)
    }

    /// Drop every displayed message except the greeting. Refused while busy.
    pub fn reset(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.messages.clear();
        self.push_greeting();
        true
    }

    pub fn context(&self) -> Result<Context, ChatError> {
        Ok(self.context_store.load()?)
    }

    /// Forget the persisted context. Refused while busy.
    pub fn clear_context(&mut self) -> Result<bool, ChatError> {
        if self.is_busy() {
            return Ok(false);
        }
        self.context_store.save(&Context::new())?;
        Ok(true)
    }

    pub fn profile(&self) -> Result<Profile, ChatError> {
        Ok(self.profile_store.load()?)
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), ChatError> {
        Ok(self.profile_store.save(profile)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::history::PLACEHOLDER_TEXT;
    use crate::storage::MemoryStore;
    use crate::types::Sender;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const GREETING: &str = "Hello! I'm connected to the assistant server.";

    /// Answers from a script and records every request it sees
    struct ScriptedAssistant {
        replies: Mutex<Vec<Result<String, ChatError>>>,
        requests: Mutex<Vec<AssistantRequest>>,
    }

    impl ScriptedAssistant {
        fn new(replies: Vec<Result<String, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteAssistant for ScriptedAssistant {
        async fn generate(&self, request: &AssistantRequest) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ChatError::Transport("no scripted reply".to_string()));
            }
            replies.remove(0)
        }
    }

    struct BrokenStore;

    impl SessionStore<Context> for BrokenStore {
        fn load(&self) -> Result<Context, StoreError> {
            Ok(Context::new())
        }

        fn save(&self, _value: &Context) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
    }

    /// Store whose reads always fail
    struct UnreadableStore;

    impl<T> SessionStore<T> for UnreadableStore {
        fn load(&self) -> Result<T, StoreError> {
            Err(StoreError::Unavailable("locked".to_string()))
        }

        fn save(&self, _value: &T) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct Fixture {
        assistant: Arc<ScriptedAssistant>,
        context: Arc<MemoryStore<Context>>,
        profile: Arc<MemoryStore<Profile>>,
        session: ConversationSession,
    }

    fn fixture(replies: Vec<Result<String, ChatError>>) -> Fixture {
        let assistant = ScriptedAssistant::new(replies);
        let context = Arc::new(MemoryStore::new(Context::new()));
        let profile = Arc::new(MemoryStore::new(Profile::new()));
        let session = ConversationSession::new(assistant.clone(), context.clone(), profile.clone(), GREETING);
        Fixture {
            assistant,
            context,
            profile,
            session,
        }
    }

    fn texts(session: &ConversationSession) -> Vec<(Sender, String)> {
        session
            .messages()
            .iter()
            .map(|m| (m.sender, m.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_hello_round_trip() {
        let mut f = fixture(vec![Ok("Hi there".to_string())]);

        let outcome = f.session.submit("Hello").await;
        assert!(matches!(outcome, TurnOutcome::Replied { ref text, .. } if text == "Hi there"));

        let requests = f.assistant.requests.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&requests[0]).unwrap(),
            serde_json::json!({"message": "Hello", "context": []})
        );

        assert_eq!(
            texts(&f.session),
            vec![
                (Sender::Bot, GREETING.to_string()),
                (Sender::User, "Hello".to_string()),
                (Sender::Bot, "Hi there".to_string()),
            ]
        );
        assert_eq!(
            f.context.load().unwrap(),
            vec![ContextEntry::user("Hello"), ContextEntry::assistant("Hi there")]
        );
        assert_eq!(f.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut f = fixture(vec![]);
        for text in ["", "   ", "\n\t"] {
            assert_eq!(f.session.submit(text).await, TurnOutcome::Ignored);
        }
        assert_eq!(f.session.messages().len(), 1);
        assert_eq!(f.assistant.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_turns_grow_by_two() {
        let mut f = fixture(vec![Ok("one".to_string()), Ok("two".to_string())]);

        f.session.submit("first").await;
        f.session.submit("second").await;

        assert_eq!(f.session.messages().len(), 5);
        let context = f.context.load().unwrap();
        assert_eq!(context.len(), 4);
        assert_eq!(context[2], ContextEntry::user("second"));
        assert_eq!(context[3], ContextEntry::assistant("two"));

        // second request carried the first turn
        let requests = f.assistant.requests.lock().unwrap();
        assert_eq!(requests[1].context.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_context_untouched() {
        let mut f = fixture(vec![Ok("ok".to_string()), Err(ChatError::Status(500))]);
        f.session.submit("first").await;
        let before = f.context.load().unwrap();

        let outcome = f.session.submit("second").await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let messages = texts(&f.session);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3], (Sender::User, "second".to_string()));
        assert_eq!(messages[4], (Sender::Bot, CONNECTION_ERROR_TEXT.to_string()));
        assert!(messages.iter().all(|(_, text)| text != PLACEHOLDER_TEXT));
        assert_eq!(f.context.load().unwrap(), before);
        assert!(!f.session.is_busy());
    }

    #[tokio::test]
    async fn test_session_usable_after_failure() {
        let mut f = fixture(vec![
            Err(ChatError::Transport("refused".to_string())),
            Ok("back".to_string()),
        ]);
        f.session.submit("one").await;
        let outcome = f.session.submit("two").await;
        assert!(matches!(outcome, TurnOutcome::Replied { .. }));
        assert_eq!(f.context.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_busy_guard_allows_one_request() {
        let mut f = fixture(vec![Ok("reply".to_string())]);

        let pending = f.session.begin_turn("first").unwrap();
        assert!(f.session.is_busy());
        assert_eq!(f.session.submit("second").await, TurnOutcome::Ignored);
        assert!(f.session.begin_turn("third").is_none());
        assert_eq!(f.assistant.calls(), 0);

        let result = f.session.run_exchange(&pending).await;
        f.session.finish_turn(pending, result);

        assert_eq!(f.assistant.calls(), 1);
        assert_eq!(f.session.messages().len(), 3);
    }

    #[test]
    fn test_begin_turn_shows_messages_before_network() {
        let mut f = fixture(vec![]);
        f.session.set_input("  Hello  ");

        let pending = f.session.begin_input_turn().unwrap();
        assert_eq!(pending.text(), "Hello");
        assert_eq!(f.session.input(), "");
        assert_eq!(f.session.messages()[2].id, pending.placeholder_id());
        assert_eq!(
            texts(&f.session)[1..],
            [
                (Sender::User, "Hello".to_string()),
                (Sender::Bot, PLACEHOLDER_TEXT.to_string()),
            ]
        );
        assert_eq!(f.assistant.calls(), 0);
    }

    #[test]
    fn test_input_kept_while_busy() {
        let mut f = fixture(vec![]);
        let _pending = f.session.begin_turn("first").unwrap();

        f.session.set_input("draft");
        assert!(f.session.begin_input_turn().is_none());
        assert_eq!(f.session.input(), "draft");
        assert_eq!(f.session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_submit_input_clears_buffer() {
        let mut f = fixture(vec![Ok("fine".to_string())]);
        f.session.set_input("How are you?");
        f.session.submit_input().await;
        assert_eq!(f.session.input(), "");
        assert_eq!(f.session.messages()[1].text, "How are you?");
    }

    #[tokio::test]
    async fn test_profile_is_prefixed_to_prompt_only() {
        let mut f = fixture(vec![Ok("Dobrý den".to_string())]);
        f.profile
            .save(&Profile::from_pairs([("fullName", "Jana"), ("contact", " ")]))
            .unwrap();

        f.session.submit("Ahoj").await;

        let expected = "Uživatel s následujícími přihlašovacími údaji: \
                        {\"Jméno a příjmení\":\"Jana\"} odesílá následující zprávu: Ahoj";
        let requests = f.assistant.requests.lock().unwrap();
        assert_eq!(requests[0].message, expected);
        assert_eq!(f.session.messages()[1].text, "Ahoj");
        assert_eq!(f.context.load().unwrap()[0].content, expected);
    }

    #[tokio::test]
    async fn test_failed_save_takes_failure_path() {
        let assistant = ScriptedAssistant::new(vec![Ok("lost".to_string())]);
        let mut session = ConversationSession::new(
            assistant.clone(),
            Arc::new(BrokenStore),
            Arc::new(MemoryStore::new(Profile::new())),
            GREETING,
        );

        let outcome = session.submit("hello").await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(session.messages().last().unwrap().text, CONNECTION_ERROR_TEXT);
        assert_eq!(assistant.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_context_fails_without_calling_assistant() {
        let assistant = ScriptedAssistant::new(vec![Ok("unused".to_string())]);
        let mut session = ConversationSession::new(
            assistant.clone(),
            Arc::new(UnreadableStore),
            Arc::new(MemoryStore::new(Profile::new())),
            GREETING,
        );

        let outcome = session.submit("Hello").await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(assistant.calls(), 0);
        assert_eq!(
            texts(&session)[1..],
            [
                (Sender::User, "Hello".to_string()),
                (Sender::Bot, CONNECTION_ERROR_TEXT.to_string()),
            ]
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_unreadable_profile_sends_plain_prompt() {
        let assistant = ScriptedAssistant::new(vec![Ok("Hi there".to_string())]);
        let context = Arc::new(MemoryStore::new(Context::new()));
        let mut session =
            ConversationSession::new(assistant.clone(), context.clone(), Arc::new(UnreadableStore), GREETING);

        let outcome = session.submit("Hello").await;
        assert!(matches!(outcome, TurnOutcome::Replied { ref text, .. } if text == "Hi there"));
        assert_eq!(assistant.requests.lock().unwrap()[0].message, "Hello");
        assert_eq!(context.load().unwrap()[0], ContextEntry::user("Hello"));
    }

    #[tokio::test]
    async fn test_reset_and_clear_context() {
        let mut f = fixture(vec![Ok("a".to_string())]);
        f.session.submit("q").await;

        assert!(f.session.reset());
        assert_eq!(texts(&f.session), vec![(Sender::Bot, GREETING.to_string())]);
        assert_eq!(f.session.context().unwrap().len(), 2);

        assert!(f.session.clear_context().unwrap());
        assert!(f.session.context().unwrap().is_empty());
    }

    #[test]
    fn test_reset_refused_while_busy() {
        let mut f = fixture(vec![]);
        let _pending = f.session.begin_turn("wait").unwrap();
        assert!(!f.session.reset());
        assert!(!f.session.clear_context().unwrap());
        assert_eq!(f.session.messages().len(), 3);
    }
}
