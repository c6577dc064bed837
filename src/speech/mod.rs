//! Speech input/output.
//!
//! Platform speech engines are reached through [`SpeechBackend`]; their
//! asynchronous callbacks come back as [`PlatformEvent`]s and are fed into
//! the [`SpeechCoordinator`], which owns the listen/speak state machine and
//! publishes [`SpeechEvent`]s to the UI.

pub mod coordinator;

use serde::{Deserialize, Serialize};

use crate::config::SpeechConfig;
use crate::error::{AuraError, Result};

pub use coordinator::SpeechCoordinator;

/// Identifier of one recognition session, allocated by the coordinator.
pub type RecognitionId = u64;

/// Identifier of one utterance handed to synthesis.
pub type UtteranceId = u64;

/// What the platform can do. Probed once, at coordinator construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeechCapabilities {
    pub recognition: bool,
    pub synthesis: bool,
}

impl SpeechCapabilities {
    pub const FULL: Self = Self {
        recognition: true,
        synthesis: true,
    };

    pub const NONE: Self = Self {
        recognition: false,
        synthesis: false,
    };
}

/// Voice parameters passed with every utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<String>,
}

impl From<&SpeechConfig> for VoiceSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            language: config.language.clone(),
            rate: config.rate,
            pitch: config.pitch,
            voice: config.voice.clone(),
        }
    }
}

/// Platform speech engine.
///
/// Calls only start or stop work; outcomes arrive later as
/// [`PlatformEvent`]s tagged with the id passed here.
pub trait SpeechBackend: Send {
    fn capabilities(&self) -> SpeechCapabilities;

    /// Begin a single-utterance recognition session.
    fn start_recognition(&mut self, session: RecognitionId, language: &str) -> Result<()>;

    fn stop_recognition(&mut self, session: RecognitionId);

    /// Queue `text` for synthesis.
    fn speak(&mut self, utterance: UtteranceId, text: &str, voice: &VoiceSettings) -> Result<()>;

    /// Drop any queued or in-progress synthesis.
    fn cancel_speech(&mut self);
}

/// Callback from the platform engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    RecognitionResult {
        session: RecognitionId,
        transcript: String,
        is_final: bool,
    },
    RecognitionError {
        session: RecognitionId,
        reason: String,
    },
    /// The recognizer stopped on its own (silence, platform timeout).
    RecognitionEnded { session: RecognitionId },
    SynthesisEnded { utterance: UtteranceId },
    SynthesisError {
        utterance: UtteranceId,
        reason: String,
    },
}

/// Listen/speak state. At most one of listening and speaking is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpeechState {
    #[default]
    Idle,
    Listening,
    Speaking,
}

/// A speech failure reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechFailure {
    #[error("speech recognition error: {0}")]
    Recognition(String),
    #[error("speech synthesis error: {0}")]
    Synthesis(String),
}

impl From<SpeechFailure> for AuraError {
    fn from(failure: SpeechFailure) -> Self {
        match failure {
            SpeechFailure::Recognition(reason) => AuraError::Recognition(reason),
            SpeechFailure::Synthesis(reason) => AuraError::Synthesis(reason),
        }
    }
}

/// Event published by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Final recognized text of a listening session.
    Transcript(String),
    InterimTranscript(String),
    Error(SpeechFailure),
    SpeakingFinished { utterance: UtteranceId },
    StateChanged(SpeechState),
}

/// Backend for hosts without any speech engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeechBackend;

impl SpeechBackend for NullSpeechBackend {
    fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities::NONE
    }

    fn start_recognition(&mut self, _session: RecognitionId, _language: &str) -> Result<()> {
        Err(AuraError::Recognition("speech recognition is not supported".into()))
    }

    fn stop_recognition(&mut self, _session: RecognitionId) {}

    fn speak(&mut self, _utterance: UtteranceId, _text: &str, _voice: &VoiceSettings) -> Result<()> {
        Err(AuraError::Synthesis("speech synthesis is not supported".into()))
    }

    fn cancel_speech(&mut self) {}
}
