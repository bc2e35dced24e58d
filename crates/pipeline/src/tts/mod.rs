//! Text-to-speech backends

mod elevenlabs;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsSynthesizer, VoiceSettings};

use thiserror::Error;

/// TTS errors
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to store audio: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        TtsError::Network(err.to_string())
    }
}

impl From<TtsError> for voicebot_core::Error {
    fn from(err: TtsError) -> Self {
        voicebot_core::Error::Tts(err.to_string())
    }
}
