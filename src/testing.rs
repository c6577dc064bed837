//! Test doubles for the gateway and speech seams.
//!
//! Used by unit tests and by the integration tests under `tests/`, which is
//! why the module is public.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AuraError, Result};
use crate::profile::{ProfilePatch, UserProfile, merge};
use crate::remote::{ChatTurnRequest, ChatTurnResponse, RemoteGateway};
use crate::speech::{
    RecognitionId, SpeechBackend, SpeechCapabilities, UtteranceId, VoiceSettings,
};

// ---------------------------------------------------------------------------
// Gateways
// ---------------------------------------------------------------------------

/// Gateway whose every call fails with `RemoteUnavailable`.
#[derive(Debug, Default)]
pub struct UnreachableGateway {
    calls: AtomicUsize,
}

impl UnreachableGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls attempted, `ping` excluded.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self, operation: &str) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuraError::RemoteUnavailable(format!(
            "{operation}: connection refused"
        )))
    }
}

#[async_trait]
impl RemoteGateway for UnreachableGateway {
    async fn ping(&self) -> bool {
        false
    }

    async fn create_profile(&self, _name: &str, _email: &str) -> Result<UserProfile> {
        self.fail("create profile")
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<UserProfile> {
        self.fail("fetch profile")
    }

    async fn update_profile(&self, _user_id: &str, _patch: &ProfilePatch) -> Result<UserProfile> {
        self.fail("update profile")
    }

    async fn send_chat_turn(&self, _request: &ChatTurnRequest) -> Result<ChatTurnResponse> {
        self.fail("chat")
    }
}

/// Reachable gateway backed by a single in-memory profile.
///
/// Updates are merged into the held profile; chat replies echo the message.
#[derive(Debug)]
pub struct StaticGateway {
    profile: Mutex<UserProfile>,
}

impl StaticGateway {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile: Mutex::new(profile),
        }
    }

    fn profile(&self) -> MutexGuard<'_, UserProfile> {
        self.profile.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteGateway for StaticGateway {
    async fn ping(&self) -> bool {
        true
    }

    async fn create_profile(&self, _name: &str, _email: &str) -> Result<UserProfile> {
        Ok(self.profile().clone())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile> {
        let profile = self.profile();
        if profile.user_id == user_id {
            Ok(profile.clone())
        } else {
            Err(AuraError::NotFound(format!("user {user_id}")))
        }
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<UserProfile> {
        let mut profile = self.profile();
        if profile.user_id != user_id {
            return Err(AuraError::NotFound(format!("user {user_id}")));
        }
        *profile = merge(&profile, patch);
        Ok(profile.clone())
    }

    async fn send_chat_turn(&self, request: &ChatTurnRequest) -> Result<ChatTurnResponse> {
        Ok(ChatTurnResponse {
            response: format!("echo: {}", request.message),
            session_id: request.session_id.clone(),
            events: Vec::new(),
            user_context: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// A call made on [`RecordingSpeechBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    StartRecognition {
        session: RecognitionId,
        language: String,
    },
    StopRecognition {
        session: RecognitionId,
    },
    Speak {
        utterance: UtteranceId,
        text: String,
    },
    CancelSpeech,
}

/// Shared view of the calls a [`RecordingSpeechBackend`] received.
#[derive(Debug, Clone, Default)]
pub struct SpeechCallLog(Arc<Mutex<Vec<BackendCall>>>);

impl SpeechCallLog {
    fn push(&self, call: BackendCall) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts passed to `speak`, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Speak { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_recognition(&self) -> Option<RecognitionId> {
        self.calls().into_iter().rev().find_map(|c| match c {
            BackendCall::StartRecognition { session, .. } => Some(session),
            _ => None,
        })
    }

    pub fn last_utterance(&self) -> Option<UtteranceId> {
        self.calls().into_iter().rev().find_map(|c| match c {
            BackendCall::Speak { utterance, .. } => Some(utterance),
            _ => None,
        })
    }

    pub fn recognition_starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::StartRecognition { .. }))
            .count()
    }
}

/// Speech backend that records every call and never produces events itself.
#[derive(Debug, Clone)]
pub struct RecordingSpeechBackend {
    capabilities: SpeechCapabilities,
    log: SpeechCallLog,
    recognition_failure: Option<String>,
    synthesis_failure: Option<String>,
}

impl Default for RecordingSpeechBackend {
    fn default() -> Self {
        Self::with_capabilities(SpeechCapabilities::FULL)
    }
}

impl RecordingSpeechBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: SpeechCapabilities) -> Self {
        Self {
            capabilities,
            log: SpeechCallLog::default(),
            recognition_failure: None,
            synthesis_failure: None,
        }
    }

    /// Make `start_recognition` fail with `reason`.
    pub fn failing_recognition(mut self, reason: impl Into<String>) -> Self {
        self.recognition_failure = Some(reason.into());
        self
    }

    /// Make `speak` fail with `reason`.
    pub fn failing_synthesis(mut self, reason: impl Into<String>) -> Self {
        self.synthesis_failure = Some(reason.into());
        self
    }

    pub fn log(&self) -> SpeechCallLog {
        self.log.clone()
    }
}

impl SpeechBackend for RecordingSpeechBackend {
    fn capabilities(&self) -> SpeechCapabilities {
        self.capabilities
    }

    fn start_recognition(&mut self, session: RecognitionId, language: &str) -> Result<()> {
        if let Some(reason) = &self.recognition_failure {
            return Err(AuraError::Recognition(reason.clone()));
        }
        self.log.push(BackendCall::StartRecognition {
            session,
            language: language.to_owned(),
        });
        Ok(())
    }

    fn stop_recognition(&mut self, session: RecognitionId) {
        self.log.push(BackendCall::StopRecognition { session });
    }

    fn speak(&mut self, utterance: UtteranceId, text: &str, _voice: &VoiceSettings) -> Result<()> {
        if let Some(reason) = &self.synthesis_failure {
            return Err(AuraError::Synthesis(reason.clone()));
        }
        self.log.push(BackendCall::Speak {
            utterance,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn cancel_speech(&mut self) {
        self.log.push(BackendCall::CancelSpeech);
    }
}
