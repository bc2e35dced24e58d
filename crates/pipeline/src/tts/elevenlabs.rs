//! ElevenLabs HTTP synthesizer
//!
//! Each call renders one MP3 file into the audio directory; the returned [`AudioRef`] is
//! the file name, which the server exposes under `/audio/`. Reply clips are deleted again
//! through [`Synthesizer::release`] when their call ends.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use voicebot_core::{AudioRef, Synthesizer};

use super::TtsError;

/// Voice settings for ElevenLabs TTS
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    pub stability: f32,
    /// Similarity boost (0.0 to 1.0)
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// ElevenLabs configuration
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
    /// Directory the rendered clips are written to
    pub audio_dir: PathBuf,
    pub timeout: Duration,
}

impl From<&voicebot_config::TtsConfig> for ElevenLabsConfig {
    fn from(settings: &voicebot_config::TtsConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            voice_id: settings.voice_id.clone(),
            model_id: settings.model_id.clone(),
            voice_settings: VoiceSettings {
                stability: settings.stability,
                similarity_boost: settings.similarity_boost,
            },
            audio_dir: PathBuf::from(&settings.audio_dir),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// [`Synthesizer`] using the ElevenLabs REST API
pub struct ElevenLabsSynthesizer {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: ElevenLabsConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TtsError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        if config.api_key.is_empty() {
            tracing::warn!("ElevenLabs API key missing; every synthesis will fall back");
        }

        Ok(Self { config, client })
    }

    pub fn audio_dir(&self) -> &Path {
        &self.config.audio_dir
    }

    fn synthesis_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.voice_id
        )
    }

    fn build_request(&self, text: &str) -> reqwest::RequestBuilder {
        let body = SynthesisRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: self.config.voice_settings,
        };

        self.client
            .post(self.synthesis_url())
            .header("xi-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .json(&body)
    }

    async fn render(&self, text: &str) -> Result<AudioRef, TtsError> {
        if self.config.api_key.is_empty() {
            return Err(TtsError::Configuration("API key is required for ElevenLabs".to_string()));
        }

        let start = Instant::now();
        let response = self.build_request(text).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let audio = response.bytes().await?;

        tokio::fs::create_dir_all(&self.config.audio_dir).await?;
        let file_name = format!("{}.mp3", uuid::Uuid::new_v4());
        tokio::fs::write(self.config.audio_dir.join(&file_name), &audio).await?;

        tracing::info!(
            bytes = audio.len(),
            file = %file_name,
            latency_ms = start.elapsed().as_millis() as u64,
            "Synthesized audio"
        );

        Ok(AudioRef::new(file_name))
    }

    async fn remove(&self, audio: &AudioRef) -> Result<(), TtsError> {
        let name = audio.as_str();
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name.starts_with('.') {
            return Err(TtsError::Configuration(format!("Not a clip name: {}", name)));
        }

        match tokio::fs::remove_file(self.audio_dir().join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> voicebot_core::Result<AudioRef> {
        Ok(self.render(text).await?)
    }

    async fn release(&self, audio: &AudioRef) -> voicebot_core::Result<()> {
        Ok(self.remove(audio).await?)
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, api_key: &str) -> ElevenLabsConfig {
        let mut settings = voicebot_config::TtsConfig::default();
        settings.api_key = api_key.to_string();
        settings.voice_id = "voice123".to_string();
        settings.audio_dir = dir.display().to_string();
        ElevenLabsConfig::from(&settings)
    }

    #[test]
    fn test_request_shape() {
        let dir = tempfile::tempdir().unwrap();
        let tts = ElevenLabsSynthesizer::new(config(dir.path(), "test_key")).unwrap();

        let request = tts.build_request("Mm-hmm.").build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123"
        );
        assert_eq!(request.headers().get("xi-api-key").unwrap(), "test_key");
        assert_eq!(request.headers().get("Accept").unwrap(), "audio/mpeg");

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["text"], "Mm-hmm.");
        assert_eq!(body["model_id"], "eleven_turbo_v2_5");
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let tts = ElevenLabsSynthesizer::new(config(dir.path(), "")).unwrap();

        let err = tts.synthesize("Okay.").await.unwrap_err();
        assert!(matches!(err, voicebot_core::Error::Tts(_)));
        assert_eq!(tts.model_name(), "eleven_turbo_v2_5");
    }

    #[tokio::test]
    async fn test_release_deletes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let tts = ElevenLabsSynthesizer::new(config(dir.path(), "test_key")).unwrap();
        let clip = dir.path().join("reply.mp3");
        std::fs::write(&clip, b"ID3").unwrap();

        tts.release(&AudioRef::new("reply.mp3")).await.unwrap();
        assert!(!clip.exists());

        // Already gone
        tts.release(&AudioRef::new("reply.mp3")).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let tts = ElevenLabsSynthesizer::new(config(dir.path(), "test_key")).unwrap();

        for name in ["../secret.mp3", "nested/a.mp3", ""] {
            let err = tts.release(&AudioRef::new(name)).await.unwrap_err();
            assert!(matches!(err, voicebot_core::Error::Tts(_)));
        }
    }
}
