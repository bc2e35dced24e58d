//! Audio artifacts handed to the telephony layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a playable audio artifact produced by a [`crate::Synthesizer`].
///
/// The reference is opaque to the orchestrator; the server resolves it to a public URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a reply will be voiced when it is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechAudio {
    /// Pre-rendered audio is available
    Synthesized(AudioRef),
    /// Synthesis failed; speak the text with the telephony layer's own voice
    Fallback,
}

impl SpeechAudio {
    pub fn is_fallback(&self) -> bool {
        matches!(self, SpeechAudio::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_ref_display() {
        let audio = AudioRef::new("abc.mp3");
        assert_eq!(audio.to_string(), "abc.mp3");
        assert_eq!(audio.as_str(), "abc.mp3");
    }

    #[test]
    fn test_fallback_flag() {
        assert!(SpeechAudio::Fallback.is_fallback());
        assert!(!SpeechAudio::Synthesized(AudioRef::new("a.mp3")).is_fallback());
    }
}
