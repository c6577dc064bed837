//! Conversation sessions.
//!
//! A [`ConversationSession`] owns everything one chat needs: the session
//! context (id plus the traveller it speaks for), the message log, the busy
//! flag, the last error and the [`SpeechCoordinator`]. Nothing here is global;
//! two sessions never share state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::ChatService;
use crate::profile::UserProfile;
use crate::speech::{SpeechCoordinator, SpeechEvent, SpeechFailure};

/// Agent reply appended when a chat turn fails.
pub const APOLOGY: &str =
    "I'm sorry, I encountered an error communicating with my services. Please try again.";

/// The traveller a session speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
    pub name: String,
}

impl From<&UserProfile> for SessionUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            name: profile.display_name().to_owned(),
        }
    }
}

/// Identity of one conversation; fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub user: Option<SessionUser>,
}

impl SessionContext {
    /// Start a new context with a fresh `session-<uuid>` id.
    pub fn new(user: Option<SessionUser>) -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(sender: Sender, text: impl Into<String>) -> Self {
        let prefix = match sender {
            Sender::User => "user",
            Sender::Agent => "agent",
        };
        Self {
            id: format!("{prefix}-{}", uuid::Uuid::new_v4()),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Why a submission was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyMessage,
    NoProfile,
    /// A turn is still in flight. `submit` holds `&mut self` for the whole
    /// turn, so overlapping calls are ruled out at compile time and this is
    /// not returned in practice.
    Busy,
}

/// Result of [`ConversationSession::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The agent replied; the reply is the last message in the log.
    Replied,
    /// The turn failed; the apology is the last message and `error()` is set.
    Failed,
    /// Nothing was sent and the log is unchanged.
    Rejected(RejectReason),
}

/// Clears the busy flag however the turn ends.
///
/// A `submit` future dropped mid-turn (a timeout, a `select!` branch losing)
/// never reaches the code after its await point, so the reset lives in
/// `Drop`. The user's message stays in the log without a reply.
struct BusyGuard<'a>(&'a mut bool);

impl<'a> BusyGuard<'a> {
    fn hold(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// One chat conversation.
pub struct ConversationSession {
    context: SessionContext,
    chat: Arc<dyn ChatService>,
    speech: SpeechCoordinator,
    auto_speak: bool,
    messages: Vec<ChatMessage>,
    busy: bool,
    error: Option<String>,
}

impl ConversationSession {
    pub fn new(
        context: SessionContext,
        chat: Arc<dyn ChatService>,
        speech: SpeechCoordinator,
        auto_speak: bool,
    ) -> Self {
        info!(session_id = context.session_id.as_str(), "conversation session started");
        Self {
            context,
            chat,
            speech,
            auto_speak,
            messages: Vec::new(),
            busy: false,
            error: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn speech(&self) -> &SpeechCoordinator {
        &self.speech
    }

    pub fn speech_mut(&mut self) -> &mut SpeechCoordinator {
        &mut self.speech
    }

    /// Opening line shown before the first turn. Not part of the log.
    pub fn greeting(&self) -> String {
        let name = self.context.user.as_ref().map_or("", |u| u.name.as_str());
        format!(
            "Hello {name}! I'm Aura, your inclusive travel assistant. How can I help you plan \
             your accessible journey today?"
        )
    }

    /// Send one user message and record the agent's answer.
    ///
    /// Never fails: a chat error becomes an apology in the log plus
    /// `error()`. Failed turns are not retried.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyMessage);
        }
        let Some(user) = &self.context.user else {
            return SubmitOutcome::Rejected(RejectReason::NoProfile);
        };
        if self.busy {
            return SubmitOutcome::Rejected(RejectReason::Busy);
        }

        self.messages.push(ChatMessage::new(Sender::User, text));
        self.error = None;

        let result = {
            let _busy = BusyGuard::hold(&mut self.busy);
            self.chat
                .chat(text, &self.context.session_id, Some(&user.user_id))
                .await
        };

        match result {
            Ok(reply) => {
                self.messages
                    .push(ChatMessage::new(Sender::Agent, reply.response.as_str()));
                if self.auto_speak {
                    self.speech.speak(&reply.response);
                }
                SubmitOutcome::Replied
            }
            Err(e) => {
                warn!(
                    session_id = self.context.session_id.as_str(),
                    error = %e,
                    "chat turn failed"
                );
                self.error = Some(format!("Failed to get response: {e}"));
                self.messages.push(ChatMessage::new(Sender::Agent, APOLOGY));
                SubmitOutcome::Failed
            }
        }
    }

    /// Apply a coordinator event to session state.
    ///
    /// Returns the recognized text for a final transcript so the host can
    /// place it in the input field or submit it directly.
    pub fn observe_speech_event(&mut self, event: &SpeechEvent) -> Option<String> {
        match event {
            SpeechEvent::Transcript(text) => Some(text.clone()),
            SpeechEvent::Error(SpeechFailure::Recognition(reason)) => {
                self.error = Some(format!("Speech recognition error: {reason}"));
                None
            }
            _ => None,
        }
    }

    /// Stop all speech activity and discard the log.
    pub fn end(mut self) {
        self.speech.shutdown();
        info!(
            session_id = self.context.session_id.as_str(),
            messages = self.messages.len(),
            "conversation session ended"
        );
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::time::Duration;

    use super::*;
    use crate::config::{ConnectivityMode, ProfileDefaults, SpeechConfig};
    use crate::dispatch::ConnectivityDispatcher;
    use crate::remote::ChatTurnResponse;
    use crate::speech::SpeechState;
    use crate::store::MemoryProfileStore;
    use crate::testing::{RecordingSpeechBackend, SpeechCallLog, UnreachableGateway};

    /// Chat service whose turns never complete.
    struct StalledChat;

    #[async_trait::async_trait]
    impl ChatService for StalledChat {
        async fn chat(
            &self,
            _message: &str,
            _session_id: &str,
            _user_id: Option<&str>,
        ) -> crate::error::Result<ChatTurnResponse> {
            std::future::pending().await
        }
    }

    async fn session_with(
        mode: ConnectivityMode,
        with_user: bool,
    ) -> (ConversationSession, SpeechCallLog) {
        let dispatcher = Arc::new(ConnectivityDispatcher::new(
            Arc::new(UnreachableGateway::new()),
            Arc::new(MemoryProfileStore::new()),
            ConnectivityMode::LocalOnly,
            ProfileDefaults::default(),
        ));
        let user = if with_user {
            let profile = dispatcher
                .create_profile("Jane", "jane@x.com")
                .await
                .unwrap()
                .value;
            Some(SessionUser::from(&profile))
        } else {
            None
        };
        dispatcher.set_mode(mode);

        let backend = RecordingSpeechBackend::new();
        let log = backend.log();
        let (speech, _rx) = SpeechCoordinator::new(Box::new(backend), &SpeechConfig::default());
        let session = ConversationSession::new(SessionContext::new(user), dispatcher, speech, true);
        (session, log)
    }

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = SessionContext::new(None);
        let b = SessionContext::new(None);
        assert!(a.session_id.starts_with("session-"));
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn turns_alternate_user_and_agent() {
        let (mut session, _log) = session_with(ConnectivityMode::Auto, true).await;
        for text in ["first", "second", "third"] {
            assert_eq!(session.submit(text).await, SubmitOutcome::Replied);
        }
        let messages = session.messages();
        assert_eq!(messages.len(), 6);
        for (i, m) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Agent };
            assert_eq!(m.sender, expected);
        }
        assert!(!session.is_busy());
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn cancelled_turn_leaves_session_idle() {
        let (mut session, _log) = session_with(ConnectivityMode::LocalOnly, true).await;
        let working = session.chat.clone();
        session.chat = Arc::new(StalledChat);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), session.submit("still there?")).await;
        assert!(abandoned.is_err());
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), 1);

        session.chat = working;
        assert_eq!(session.submit("hello again").await, SubmitOutcome::Replied);
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn blank_and_profileless_submissions_are_rejected() {
        let (mut session, _log) = session_with(ConnectivityMode::Auto, true).await;
        assert_eq!(
            session.submit("   ").await,
            SubmitOutcome::Rejected(RejectReason::EmptyMessage)
        );
        assert!(session.messages().is_empty());

        let (mut anonymous, _log) = session_with(ConnectivityMode::Auto, false).await;
        assert_eq!(
            anonymous.submit("hello").await,
            SubmitOutcome::Rejected(RejectReason::NoProfile)
        );
        assert!(anonymous.messages().is_empty());
    }

    #[tokio::test]
    async fn failed_turn_appends_apology() {
        let (mut session, log) = session_with(ConnectivityMode::RemoteOnly, true).await;
        let outcome = session
            .submit("Find me a wheelchair-accessible hotel in Lisbon")
            .await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].text, APOLOGY);
        assert_eq!(session.messages()[1].sender, Sender::Agent);
        assert!(session.error().unwrap().contains("Failed to get response"));
        assert!(!session.is_busy());
        assert!(log.spoken().is_empty());
    }

    #[tokio::test]
    async fn successful_turn_clears_previous_error() {
        let (mut session, _log) = session_with(ConnectivityMode::RemoteOnly, true).await;
        session.submit("one").await;
        assert!(session.error().is_some());

        session.chat = Arc::new(ConnectivityDispatcher::new(
            Arc::new(UnreachableGateway::new()),
            Arc::new(MemoryProfileStore::new()),
            ConnectivityMode::Auto,
            ProfileDefaults::default(),
        ));
        assert_eq!(session.submit("two").await, SubmitOutcome::Replied);
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn replies_are_spoken_when_enabled() {
        let (mut session, log) = session_with(ConnectivityMode::Auto, true).await;
        session.submit("hello").await;
        let reply = session.messages()[1].text.clone();
        assert_eq!(log.spoken(), vec![reply]);
        assert_eq!(session.speech().state(), SpeechState::Speaking);
    }

    #[tokio::test]
    async fn greeting_names_the_traveller_and_is_not_logged() {
        let (session, _log) = session_with(ConnectivityMode::Auto, true).await;
        assert_eq!(
            session.greeting(),
            "Hello Jane! I'm Aura, your inclusive travel assistant. How can I help you plan \
             your accessible journey today?"
        );
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn recognition_errors_surface_on_the_session() {
        let (mut session, _log) = session_with(ConnectivityMode::Auto, true).await;
        let transcript =
            session.observe_speech_event(&SpeechEvent::Transcript("Lisbon hotels".into()));
        assert_eq!(transcript.as_deref(), Some("Lisbon hotels"));

        session.observe_speech_event(&SpeechEvent::Error(SpeechFailure::Recognition(
            "not-allowed".into(),
        )));
        assert_eq!(session.error(), Some("Speech recognition error: not-allowed"));
    }

    #[tokio::test]
    async fn end_stops_speech() {
        let (mut session, log) = session_with(ConnectivityMode::Auto, true).await;
        session.submit("hello").await;
        session.end();
        assert!(log.calls().contains(&crate::testing::BackendCall::CancelSpeech));
    }
}
