//! TwiML rendering
//!
//! Turns [`CallResponse`] verbs into the XML document Twilio executes.

use std::fmt::Write as _;

use voicebot_agent::{CallResponse, Verb};
use voicebot_config::constants::telephony;
use voicebot_config::Settings;
use voicebot_core::AudioRef;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Renders response descriptors for one deployment
#[derive(Debug, Clone)]
pub struct TwimlRenderer {
    public_url: String,
    voice: String,
    language: String,
}

impl TwimlRenderer {
    pub fn new(public_url: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
            voice: voice.into(),
            language: telephony::LANGUAGE.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.server.public_url, &settings.tts.fallback_voice)
    }

    /// Public URL Twilio fetches a synthesized clip from
    pub fn audio_url(&self, audio: &AudioRef) -> String {
        format!("{}/audio/{}", self.public_url, audio)
    }

    pub fn render(&self, response: &CallResponse) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(XML_HEADER);
        out.push_str("<Response>");

        // Writing into a String cannot fail
        for verb in response.verbs() {
            match verb {
                Verb::Say(text) => {
                    let _ = write!(
                        out,
                        r#"<Say voice="{}">{}</Say>"#,
                        escape(&self.voice),
                        escape(text)
                    );
                }
                Verb::Play(audio) => {
                    let _ = write!(out, "<Play>{}</Play>", escape(&self.audio_url(audio)));
                }
                Verb::Listen {
                    timeout_secs,
                    silence_secs,
                    on_speech,
                    on_timeout,
                } => {
                    let _ = write!(
                        out,
                        r#"<Gather action="{}" input="speech" language="{}" speechTimeout="{}" timeout="{}" />"#,
                        on_speech.path(),
                        escape(&self.language),
                        silence_secs,
                        timeout_secs
                    );
                    let _ = write!(out, r#"<Redirect method="POST">{}</Redirect>"#, on_timeout.path());
                }
                Verb::Wait(secs) => {
                    let _ = write!(out, r#"<Pause length="{}" />"#, secs);
                }
                Verb::Redirect(callback) => {
                    let _ = write!(out, r#"<Redirect method="POST">{}</Redirect>"#, callback.path());
                }
                Verb::Hangup => out.push_str("<Hangup />"),
            }
        }

        out.push_str("</Response>");
        out
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
