//! Configuration management for the voice bot
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (VOICEBOT_ prefix, `__` separator)
//!
//! The static scenario catalog lives here as well; it can be replaced by a YAML file
//! referenced from `scenarios_path`.

pub mod constants;
pub mod scenarios;
pub mod settings;

pub use scenarios::ScenarioCatalog;
pub use settings::{
    load_settings, CallConfig, FillerConfig, ListenTiming, LlmConfig, ObservabilityConfig,
    RuntimeEnvironment, ServerConfig, Settings, TranscriptConfig, TtsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voicebot_core::Error {
    fn from(err: ConfigError) -> Self {
        voicebot_core::Error::Config(err.to_string())
    }
}
