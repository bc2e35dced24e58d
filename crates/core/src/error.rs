//! Error types shared by every crate in the workspace

use thiserror::Error;

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Transcript error: {0}")]
    Transcript(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure came from an upstream collaborator (reply generation or synthesis).
    ///
    /// Upstream failures are recovered with a fallback utterance and never reach the
    /// telephony layer.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Llm(_) | Error::Tts(_))
    }
}
