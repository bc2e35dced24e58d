//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, fillers, telephony};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Production mode - credentials required
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Webhook server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Turn-taking and listen timings
    #[serde(default)]
    pub call: CallConfig,

    /// Reply generation backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Speech synthesis backend
    #[serde(default)]
    pub tts: TtsConfig,

    /// Filler clip texts
    #[serde(default)]
    pub fillers: FillerConfig,

    /// Transcript output
    #[serde(default)]
    pub transcripts: TranscriptConfig,

    /// Optional YAML file replacing the built-in scenario catalog
    #[serde(default)]
    pub scenarios_path: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_call()?;
        self.validate_llm()?;
        self.validate_tts()?;
        self.validate_fillers()?;

        if self.transcripts.dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transcripts.dir".to_string(),
                message: "Transcript directory cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.public_url.is_empty() {
            if self.environment.is_production() {
                return Err(ConfigError::MissingField("server.public_url".to_string()));
            }
            tracing::warn!(
                "server.public_url is not set; audio clips will be referenced by relative URL"
            );
        }

        Ok(())
    }

    fn validate_call(&self) -> Result<(), ConfigError> {
        let call = &self.call;

        if call.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.max_turns".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if call.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.poll_interval_secs".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if call.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.max_poll_attempts".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        for (field, timing) in [
            ("call.opening_listen", &call.opening_listen),
            ("call.patient_listen", &call.patient_listen),
            ("call.relisten", &call.relisten),
            ("call.reply_listen", &call.reply_listen),
        ] {
            if timing.timeout_secs == 0 || timing.silence_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Listen timeout and silence window must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.llm.api_key.is_empty() {
            if self.environment.is_production() {
                return Err(ConfigError::MissingField("llm.api_key".to_string()));
            }
            tracing::warn!("llm.api_key is not set (OPENAI_API_KEY); reply generation will fail");
        }

        Ok(())
    }

    fn validate_tts(&self) -> Result<(), ConfigError> {
        if self.tts.audio_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "tts.audio_dir".to_string(),
                message: "Audio directory cannot be empty".to_string(),
            });
        }

        if self.tts.api_key.is_empty() {
            if self.environment.is_production() {
                return Err(ConfigError::MissingField("tts.api_key".to_string()));
            }
            tracing::warn!(
                "tts.api_key is not set (ELEVENLABS_API_KEY); replies will use the fallback voice"
            );
        }

        Ok(())
    }

    fn validate_fillers(&self) -> Result<(), ConfigError> {
        let distinct: std::collections::HashSet<&str> =
            self.fillers.texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();

        if distinct.len() < 2 {
            return Err(ConfigError::InvalidValue {
                field: "fillers.texts".to_string(),
                message: "At least two distinct filler texts are required".to_string(),
            });
        }

        Ok(())
    }
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL the telephony provider reaches us on (no trailing slash)
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_public_url() -> String {
    std::env::var("NGROK_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_default()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

/// How long to listen for the agent and how much trailing silence ends an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenTiming {
    /// Seconds to wait for speech to begin
    pub timeout_secs: u32,
    /// Seconds of silence after speech before the utterance is considered complete
    pub silence_secs: u32,
}

impl ListenTiming {
    pub const fn new(timeout_secs: u32, silence_secs: u32) -> Self {
        Self {
            timeout_secs,
            silence_secs,
        }
    }
}

/// Turn-taking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Agent turns accepted before the caller says goodbye and hangs up
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Seconds to wait between polls for a pending reply
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u32,

    /// Consecutive not-ready polls before the pending reply is abandoned
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Quiet pause before the call-start and first-silence listen windows
    #[serde(default = "default_listen_pause")]
    pub listen_pause_secs: u32,

    /// While a reply is pending, every Nth not-ready poll plays a filler instead of dead
    /// air (0 disables)
    #[serde(default = "default_filler_every_polls")]
    pub filler_every_polls: u32,

    /// Listen window while waiting for the agent's greeting
    #[serde(default = "default_opening_listen")]
    pub opening_listen: ListenTiming,

    /// First silence level: wait quietly with a more patient silence window
    #[serde(default = "default_patient_listen")]
    pub patient_listen: ListenTiming,

    /// Later silence levels, after the caller has spoken
    #[serde(default = "default_relisten")]
    pub relisten: ListenTiming,

    /// After delivering a reply
    #[serde(default = "default_reply_listen")]
    pub reply_listen: ListenTiming,
}

fn default_max_turns() -> u32 {
    15
}
fn default_poll_interval() -> u32 {
    1
}
fn default_max_poll_attempts() -> u32 {
    30
}
fn default_listen_pause() -> u32 {
    2
}
fn default_filler_every_polls() -> u32 {
    4
}
fn default_opening_listen() -> ListenTiming {
    ListenTiming::new(15, 2)
}
fn default_patient_listen() -> ListenTiming {
    ListenTiming::new(12, 4)
}
fn default_relisten() -> ListenTiming {
    ListenTiming::new(12, 2)
}
fn default_reply_listen() -> ListenTiming {
    ListenTiming::new(12, 1)
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            listen_pause_secs: default_listen_pause(),
            filler_every_polls: default_filler_every_polls(),
            opening_listen: default_opening_listen(),
            patient_listen: default_patient_listen(),
            relisten: default_relisten(),
            reply_listen: default_reply_listen(),
        }
    }
}

/// Reply generation backend (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (defaults to OPENAI_API_KEY)
    #[serde(default = "default_llm_api_key")]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_llm_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_max_tokens() -> usize {
    200
}
fn default_llm_temperature() -> f32 {
    0.8
}
fn default_llm_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Speech synthesis backend (ElevenLabs HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// API key (defaults to ELEVENLABS_API_KEY)
    #[serde(default = "default_tts_api_key")]
    pub api_key: String,

    /// Voice id (defaults to ELEVENLABS_VOICE_ID)
    #[serde(default = "default_tts_voice_id")]
    pub voice_id: String,

    #[serde(default = "default_tts_model")]
    pub model_id: String,

    #[serde(default = "default_stability")]
    pub stability: f32,

    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,

    /// Directory synthesized clips are written to and served from
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Telephony voice used when no synthesized audio is available (defaults to TTS_VOICE)
    #[serde(default = "default_fallback_voice")]
    pub fallback_voice: String,

    /// Request timeout in seconds
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,
}

fn default_tts_endpoint() -> String {
    endpoints::ELEVENLABS_TTS.to_string()
}
fn default_tts_api_key() -> String {
    std::env::var("ELEVENLABS_API_KEY").unwrap_or_default()
}
fn default_tts_voice_id() -> String {
    std::env::var("ELEVENLABS_VOICE_ID").unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string())
}
fn default_tts_model() -> String {
    "eleven_turbo_v2_5".to_string()
}
fn default_stability() -> f32 {
    0.5
}
fn default_similarity_boost() -> f32 {
    0.75
}
fn default_audio_dir() -> String {
    "audio_cache".to_string()
}
fn default_fallback_voice() -> String {
    std::env::var("TTS_VOICE").unwrap_or_else(|_| telephony::DEFAULT_VOICE.to_string())
}
fn default_tts_timeout() -> u64 {
    30
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            api_key: default_tts_api_key(),
            voice_id: default_tts_voice_id(),
            model_id: default_tts_model(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            audio_dir: default_audio_dir(),
            fallback_voice: default_fallback_voice(),
            timeout_secs: default_tts_timeout(),
        }
    }
}

/// Filler clip texts pre-synthesized at start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillerConfig {
    #[serde(default = "default_filler_texts")]
    pub texts: Vec<String>,
}

fn default_filler_texts() -> Vec<String> {
    fillers::DEFAULT_TEXTS.iter().map(|t| t.to_string()).collect()
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            texts: default_filler_texts(),
        }
    }
}

/// Transcript output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_transcript_dir")]
    pub dir: String,
}

fn default_transcript_dir() -> String {
    "transcripts".to_string()
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            dir: default_transcript_dir(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOICEBOT_ prefix, e.g. `VOICEBOT__CALL__MAX_TURNS`)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICEBOT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
