//! Error types for the Aura client engine.

/// Top-level error type for profile sync, chat relay and speech I/O.
#[derive(Debug, thiserror::Error)]
pub enum AuraError {
    /// The backend could not be reached or answered with something unusable
    /// (transport failure, non-2xx status, non-JSON body).
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Neither the backend nor the local cache knows the record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Platform speech recognition failure.
    #[error("speech recognition error: {0}")]
    Recognition(String),

    /// Platform speech synthesis failure.
    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    /// Blank or malformed required input, rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Local profile store read/write/serialization failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl AuraError {
    /// Returns `true` when the dispatcher should try the local path instead.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::NotFound(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AuraError>;
