//! Listen/speak state machine.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    PlatformEvent, RecognitionId, SpeechBackend, SpeechCapabilities, SpeechEvent, SpeechFailure,
    SpeechState, UtteranceId, VoiceSettings,
};
use crate::config::SpeechConfig;

/// Drives a [`SpeechBackend`] and publishes [`SpeechEvent`]s.
///
/// Listening and speaking are mutually exclusive: speaking stops an active
/// recognition session, and listening cancels in-flight speech (barge-in).
/// Platform events carrying an id other than the active session or utterance
/// are stale and ignored, so a termination arriving after an explicit stop
/// never produces a second transition.
pub struct SpeechCoordinator {
    backend: Box<dyn SpeechBackend>,
    capabilities: SpeechCapabilities,
    voice: VoiceSettings,
    state: SpeechState,
    next_id: u64,
    active_recognition: Option<RecognitionId>,
    active_utterance: Option<UtteranceId>,
    events: mpsc::UnboundedSender<SpeechEvent>,
}

impl SpeechCoordinator {
    /// Create a coordinator and the receiver for its events.
    pub fn new(
        backend: Box<dyn SpeechBackend>,
        config: &SpeechConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let capabilities = backend.capabilities();
        if !capabilities.recognition || !capabilities.synthesis {
            info!(
                recognition = capabilities.recognition,
                synthesis = capabilities.synthesis,
                "speech partially or fully unsupported on this platform"
            );
        }
        let coordinator = Self {
            backend,
            capabilities,
            voice: VoiceSettings::from(config),
            state: SpeechState::Idle,
            next_id: 1,
            active_recognition: None,
            active_utterance: None,
            events: tx,
        };
        (coordinator, rx)
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn capabilities(&self) -> SpeechCapabilities {
        self.capabilities
    }

    /// `true` if either recognition or synthesis is missing.
    pub fn is_unsupported(&self) -> bool {
        !self.capabilities.recognition || !self.capabilities.synthesis
    }

    /// Begin a push-to-talk recognition session.
    ///
    /// No-op when already listening or when recognition is unsupported.
    pub fn start_listening(&mut self) {
        if !self.capabilities.recognition {
            debug!("start_listening ignored: recognition unsupported");
            return;
        }
        if self.state == SpeechState::Listening {
            return;
        }
        if self.state == SpeechState::Speaking {
            debug!("barge-in: cancelling speech to listen");
            self.cancel_active_speech();
        }

        let session = self.allocate_id();
        match self.backend.start_recognition(session, &self.voice.language) {
            Ok(()) => {
                self.active_recognition = Some(session);
                self.set_state(SpeechState::Listening);
            }
            Err(e) => {
                warn!(error = %e, "failed to start speech recognition");
                self.set_state(SpeechState::Idle);
                self.emit(SpeechEvent::Error(SpeechFailure::Recognition(e.to_string())));
            }
        }
    }

    pub fn stop_listening(&mut self) {
        if let Some(session) = self.active_recognition.take() {
            self.backend.stop_recognition(session);
        }
        if self.state == SpeechState::Listening {
            self.set_state(SpeechState::Idle);
        }
    }

    /// Read `text` aloud, replacing anything currently being spoken.
    ///
    /// Returns the utterance id, or `None` when nothing was queued (blank
    /// text, synthesis unsupported, or a backend failure).
    pub fn speak(&mut self, text: &str) -> Option<UtteranceId> {
        if !self.capabilities.synthesis {
            debug!("speak ignored: synthesis unsupported");
            return None;
        }
        if text.trim().is_empty() {
            return None;
        }
        if self.state == SpeechState::Listening {
            self.stop_listening();
        }
        self.cancel_active_speech();

        let utterance = self.allocate_id();
        match self.backend.speak(utterance, text, &self.voice) {
            Ok(()) => {
                self.active_utterance = Some(utterance);
                self.set_state(SpeechState::Speaking);
                Some(utterance)
            }
            Err(e) => {
                warn!(error = %e, "speech synthesis failed to start");
                self.set_state(SpeechState::Idle);
                self.emit(SpeechEvent::Error(SpeechFailure::Synthesis(e.to_string())));
                None
            }
        }
    }

    /// Stop speaking. No completion event is emitted.
    pub fn stop_speaking(&mut self) {
        self.cancel_active_speech();
        if self.state == SpeechState::Speaking {
            self.set_state(SpeechState::Idle);
        }
    }

    /// Stop everything; used when a session ends.
    pub fn shutdown(&mut self) {
        self.stop_listening();
        self.stop_speaking();
    }

    /// Feed a platform callback into the state machine.
    pub fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::RecognitionResult {
                session,
                transcript,
                is_final,
            } => {
                if !self.is_active_recognition(session) {
                    return;
                }
                if !is_final {
                    self.emit(SpeechEvent::InterimTranscript(transcript));
                    return;
                }
                self.backend.stop_recognition(session);
                self.active_recognition = None;
                self.set_state(SpeechState::Idle);
                let transcript = transcript.trim().to_owned();
                if !transcript.is_empty() {
                    self.emit(SpeechEvent::Transcript(transcript));
                }
            }
            PlatformEvent::RecognitionError { session, reason } => {
                if !self.is_active_recognition(session) {
                    return;
                }
                warn!(session, reason = reason.as_str(), "speech recognition error");
                self.active_recognition = None;
                self.set_state(SpeechState::Idle);
                self.emit(SpeechEvent::Error(SpeechFailure::Recognition(reason)));
            }
            PlatformEvent::RecognitionEnded { session } => {
                if !self.is_active_recognition(session) {
                    return;
                }
                self.active_recognition = None;
                self.set_state(SpeechState::Idle);
            }
            PlatformEvent::SynthesisEnded { utterance } => {
                if !self.is_active_utterance(utterance) {
                    return;
                }
                self.active_utterance = None;
                self.set_state(SpeechState::Idle);
                self.emit(SpeechEvent::SpeakingFinished { utterance });
            }
            PlatformEvent::SynthesisError { utterance, reason } => {
                if !self.is_active_utterance(utterance) {
                    return;
                }
                warn!(utterance, reason = reason.as_str(), "speech synthesis error");
                self.active_utterance = None;
                self.set_state(SpeechState::Idle);
                self.emit(SpeechEvent::Error(SpeechFailure::Synthesis(reason)));
            }
        }
    }

    fn is_active_recognition(&self, session: RecognitionId) -> bool {
        let active = self.active_recognition == Some(session);
        if !active {
            debug!(session, "ignoring stale recognition event");
        }
        active
    }

    fn is_active_utterance(&self, utterance: UtteranceId) -> bool {
        let active = self.active_utterance == Some(utterance);
        if !active {
            debug!(utterance, "ignoring stale synthesis event");
        }
        active
    }

    fn cancel_active_speech(&mut self) {
        if self.active_utterance.take().is_some() {
            self.backend.cancel_speech();
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn set_state(&mut self, state: SpeechState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "speech state changed");
            self.state = state;
            self.emit(SpeechEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SpeechEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.events.send(event);
    }
}
