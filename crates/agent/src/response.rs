//! Response descriptors
//!
//! What the telephony layer should do next, as an ordered list of verbs. The server
//! renders these to TwiML; the orchestrator and tests only deal with this form.

use voicebot_config::ListenTiming;
use voicebot_core::{AudioRef, SpeechAudio};

/// Where the telephony layer should report back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    /// Speech was captured
    Speech,
    /// A listen window closed without speech
    Silence,
    /// Check whether the pending reply is ready
    Poll,
}

impl Callback {
    pub fn path(&self) -> &'static str {
        match self {
            Callback::Speech => "/handle-response",
            Callback::Silence => "/handle-silence",
            Callback::Poll => "/poll-reply",
        }
    }
}

/// One telephony instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// Speak text with the telephony provider's voice
    Say(String),
    /// Play a synthesized clip
    Play(AudioRef),
    /// Listen for speech; report to `on_speech` or, if nothing is heard, `on_timeout`
    Listen {
        timeout_secs: u32,
        silence_secs: u32,
        on_speech: Callback,
        on_timeout: Callback,
    },
    /// Pause for a number of seconds
    Wait(u32),
    /// Continue at another callback
    Redirect(Callback),
    Hangup,
}

/// Ordered verbs answering one inbound event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResponse {
    verbs: Vec<Verb>,
}

impl CallResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response that only ends the call
    pub fn hangup_only() -> Self {
        Self::new().hangup()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, audio: AudioRef) -> Self {
        self.verbs.push(Verb::Play(audio));
        self
    }

    /// Play the synthesized clip, or speak the text when synthesis fell back
    pub fn speak(self, text: &str, audio: &SpeechAudio) -> Self {
        match audio {
            SpeechAudio::Synthesized(audio) => self.play(audio.clone()),
            SpeechAudio::Fallback => self.say(text),
        }
    }

    pub fn wait(mut self, secs: u32) -> Self {
        self.verbs.push(Verb::Wait(secs));
        self
    }

    /// Listen for the agent; speech goes to the speech callback, silence to the silence one
    pub fn listen(mut self, timing: ListenTiming) -> Self {
        self.verbs.push(Verb::Listen {
            timeout_secs: timing.timeout_secs,
            silence_secs: timing.silence_secs,
            on_speech: Callback::Speech,
            on_timeout: Callback::Silence,
        });
        self
    }

    pub fn redirect(mut self, callback: Callback) -> Self {
        self.verbs.push(Verb::Redirect(callback));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn ends_call(&self) -> bool {
        matches!(self.verbs.last(), Some(Verb::Hangup))
    }

    /// Whether the response comes back to poll for a pending reply
    pub fn polls(&self) -> bool {
        self.verbs
            .iter()
            .any(|v| matches!(v, Verb::Redirect(Callback::Poll)))
    }

    /// Whether the response opens a listen window
    pub fn listens(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Listen { .. }))
    }

    /// Text spoken with `Say`, in order
    pub fn spoken(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Say(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Clips played, in order
    pub fn played(&self) -> Vec<&AudioRef> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Play(audio) => Some(audio),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_order() {
        let response = CallResponse::new()
            .say("Hello?")
            .wait(1)
            .listen(ListenTiming::new(12, 2));

        assert_eq!(
            response.verbs(),
            &[
                Verb::Say("Hello?".to_string()),
                Verb::Wait(1),
                Verb::Listen {
                    timeout_secs: 12,
                    silence_secs: 2,
                    on_speech: Callback::Speech,
                    on_timeout: Callback::Silence,
                },
            ]
        );
        assert!(response.listens());
        assert!(!response.ends_call());
    }

    #[test]
    fn test_speak_prefers_audio() {
        let audio = SpeechAudio::Synthesized(AudioRef::new("a.mp3"));
        let response = CallResponse::new().speak("Hi", &audio);
        assert_eq!(response.played(), vec![&AudioRef::new("a.mp3")]);
        assert!(response.spoken().is_empty());

        let response = CallResponse::new().speak("Hi", &SpeechAudio::Fallback);
        assert_eq!(response.spoken(), vec!["Hi"]);
    }

    #[test]
    fn test_hangup_and_poll_detection() {
        assert!(CallResponse::hangup_only().ends_call());
        assert!(CallResponse::new().wait(1).redirect(Callback::Poll).polls());
        assert_eq!(Callback::Poll.path(), "/poll-reply");
    }
}
